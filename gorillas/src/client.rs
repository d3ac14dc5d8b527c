use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{QueryCache, QueryKind};
use crate::chain::{ChainGuard, ChainStatus};
use crate::claimed::ClaimedTasks;
use crate::config::GorillasConfig;
use crate::discord::FlowState;
use crate::error::{GorillasError, Result};
use crate::referral::PendingReferral;
use crate::rest::GorillasHttpClient;
use crate::session::{LoginState, SessionBootstrapper};
use crate::storage::Storage;
use crate::token::TokenStore;
use crate::wallet::{WalletAdapter, WalletConnection, WalletConnector};

/// Top-level view the app should be showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Unauthenticated landing page.
    Landing,
    Dashboard,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Self::Landing => "/",
            Self::Dashboard => "/dashboard",
        }
    }
}

/// Session context for the Some Gorillas backend.
///
/// Owns the token store, query cache, wallet adapter and HTTP client, and
/// wires them together: a login invalidates authenticated queries, a logout
/// (explicit, after unlinking Discord, or on any 401) evicts them, disconnects
/// the wallet and routes back to [`Route::Landing`]. Cloning yields another
/// handle to the same session.
#[derive(Debug, Clone)]
pub struct Gorillas {
    pub(crate) config: Arc<GorillasConfig>,
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) http: GorillasHttpClient,
    pub(crate) tokens: TokenStore,
    pub(crate) cache: QueryCache,
    pub(crate) wallet: Arc<WalletAdapter>,
    pub(crate) claimed: ClaimedTasks,
    pub(crate) referral: PendingReferral,
    pub(crate) chain_guard: ChainGuard,
    pub(crate) discord_flow: Arc<watch::Sender<FlowState>>,
    session: Arc<SessionBootstrapper>,
    route: Arc<watch::Sender<Route>>,
}

impl Gorillas {
    /// Create a session context. No network traffic happens until a read,
    /// a mutation or a login is requested.
    pub fn new(
        config: GorillasConfig,
        storage: Arc<dyn Storage>,
        connector: Arc<dyn WalletConnector>,
    ) -> Result<Self> {
        let tokens = TokenStore::new(Arc::clone(&storage));
        let http = GorillasHttpClient::new(&config.api_url, config.http_timeout, tokens.clone())?;
        let cache = QueryCache::new();
        let wallet = Arc::new(WalletAdapter::new(connector));
        let session = Arc::new(SessionBootstrapper::new(
            http.clone(),
            Arc::clone(&wallet),
            tokens.clone(),
            cache.clone(),
            config.signature_timeout,
        ));

        let initial = if tokens.is_logged_in() {
            Route::Dashboard
        } else {
            Route::Landing
        };
        let (route, _) = watch::channel(initial);
        let (discord_flow, _) = watch::channel(FlowState::Idle);

        Ok(Self {
            chain_guard: ChainGuard::new(config.chain_id),
            claimed: ClaimedTasks::new(Arc::clone(&storage)),
            referral: PendingReferral::new(Arc::clone(&storage)),
            config: Arc::new(config),
            storage,
            http,
            tokens,
            cache,
            wallet,
            discord_flow: Arc::new(discord_flow),
            session,
            route: Arc::new(route),
        })
    }

    pub fn config(&self) -> &GorillasConfig {
        &self.config
    }

    pub fn http_client(&self) -> &GorillasHttpClient {
        &self.http
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn wallet(&self) -> &WalletAdapter {
        &self.wallet
    }

    pub fn claimed_tasks(&self) -> &ClaimedTasks {
        &self.claimed
    }

    pub fn pending_referral(&self) -> &PendingReferral {
        &self.referral
    }

    pub fn is_logged_in(&self) -> bool {
        self.tokens.is_logged_in()
    }

    // --- Session ---

    /// Log in as `address`, which must be the connected wallet account.
    pub async fn login(&self, address: &str) -> Result<String> {
        self.login_with_cancel(address, &CancellationToken::new())
            .await
    }

    pub async fn login_with_cancel(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let token = self.session.login_with_cancel(address, cancel).await?;
        self.navigate(Route::Dashboard);
        Ok(token)
    }

    /// Connect the wallet if needed, wait for the connection to be
    /// confirmed, then log in with the connected account.
    pub async fn connect_and_login(&self, cancel: &CancellationToken) -> Result<String> {
        let connection = match self.wallet.connection() {
            Some(connection) => connection,
            None => {
                self.wallet.connect().await?;
                self.wallet.wait_connected().await?
            }
        };
        self.chain_guard.observe(Some(&connection));
        self.login_with_cancel(&connection.address_string(), cancel)
            .await
    }

    pub fn login_state(&self) -> LoginState {
        self.session.state()
    }

    pub fn subscribe_login_state(&self) -> watch::Receiver<LoginState> {
        self.session.subscribe()
    }

    /// Clear the session: token, authenticated cache entries, wallet
    /// connection. Routes to [`Route::Landing`]. Safe to call when already
    /// logged out.
    ///
    /// Every step runs even if an earlier one fails; the first error is
    /// returned.
    pub async fn logout(&self) -> Result<()> {
        let cleared = self.tokens.clear();
        self.cache.clear_authenticated();
        let disconnected = self.wallet.disconnect().await;
        self.navigate(Route::Landing);
        match &cleared {
            Ok(true) => info!("logged out"),
            Ok(false) => debug!("logout without an active session"),
            Err(e) => warn!(error = %e, "session token could not be cleared"),
        }
        cleared.and(disconnected)
    }

    /// Pass `result` through, completing the global logout first if it is
    /// an [`GorillasError::AuthFailed`].
    pub(crate) async fn guard<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(GorillasError::AuthFailed) = &result {
            warn!("session rejected by the backend, logging out");
            if let Err(e) = self.logout().await {
                warn!(error = %e, "logout after 401 did not complete cleanly");
            }
        }
        result
    }

    // --- Gating ---

    /// Whether reads of `kind` may run now: durable storage must be
    /// available, and authenticated reads also need a token.
    pub fn query_enabled(&self, kind: QueryKind) -> bool {
        if !self.storage.is_available() {
            return false;
        }
        !kind.requires_auth() || self.tokens.is_logged_in()
    }

    // --- Routing ---

    pub fn route(&self) -> Route {
        *self.route.borrow()
    }

    pub fn subscribe_route(&self) -> watch::Receiver<Route> {
        self.route.subscribe()
    }

    pub(crate) fn navigate(&self, route: Route) {
        self.route.send_if_modified(|current| {
            if *current == route {
                return false;
            }
            debug!(path = route.path(), "navigating");
            *current = route;
            true
        });
    }

    // --- Chain ---

    pub fn chain_status(&self) -> ChainStatus {
        self.chain_guard.status(self.wallet.connection().as_ref())
    }

    pub fn is_on_correct_chain(&self) -> bool {
        self.chain_guard
            .is_on_correct_chain(self.wallet.connection().as_ref())
    }

    pub(crate) fn require_connection(&self) -> Result<WalletConnection> {
        self.wallet
            .connection()
            .ok_or_else(|| GorillasError::PreconditionFailed("no wallet connected".into()))
    }
}
