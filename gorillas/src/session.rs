//! Wallet login: challenge signature, token exchange, token persistence.
//!
//! `login` runs strictly in order
//! `Idle -> AwaitingSignature -> Exchanging -> Committing -> Done`, or ends in
//! `Failed`. Nothing is written unless every step succeeds. Two concurrent
//! logins are not serialised; the last token written wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::QueryCache;
use crate::error::{GorillasError, Result};
use crate::rest::GorillasHttpClient;
use crate::token::TokenStore;
use crate::types::LoginRequest;
use crate::wallet::{format_address, parse_address, WalletAdapter};

/// Fixed prefix of the login challenge.
pub const LOGIN_MESSAGE_PREFIX: &str = "Sign this message to login: ";

/// Challenge the wallet signs to log in as `address`.
pub fn login_message(address: &str) -> String {
    format!("{LOGIN_MESSAGE_PREFIX}{address}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Idle,
    AwaitingSignature,
    Exchanging,
    Committing,
    Done,
    Failed(GorillasError),
}

/// Orchestrates wallet signature -> backend exchange -> token store.
#[derive(Debug)]
pub struct SessionBootstrapper {
    http: GorillasHttpClient,
    wallet: Arc<WalletAdapter>,
    tokens: TokenStore,
    cache: QueryCache,
    signature_timeout: Option<Duration>,
    state: watch::Sender<LoginState>,
}

impl SessionBootstrapper {
    pub fn new(
        http: GorillasHttpClient,
        wallet: Arc<WalletAdapter>,
        tokens: TokenStore,
        cache: QueryCache,
        signature_timeout: Option<Duration>,
    ) -> Self {
        let (state, _) = watch::channel(LoginState::Idle);
        Self {
            http,
            wallet,
            tokens,
            cache,
            signature_timeout,
            state,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LoginState> {
        self.state.subscribe()
    }

    /// Log in as `address`, which must be the connected wallet account.
    pub async fn login(&self, address: &str) -> Result<String> {
        self.login_with_cancel(address, &CancellationToken::new())
            .await
    }

    /// Like [`SessionBootstrapper::login`]; `cancel` aborts the signature
    /// wait with [`GorillasError::Cancelled`].
    pub async fn login_with_cancel(
        &self,
        address: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        self.state.send_replace(LoginState::Idle);
        let result = self.run(address, cancel).await;
        match &result {
            Ok(_) => {
                self.state.send_replace(LoginState::Done);
            }
            Err(e) => {
                warn!(%address, error = %e, "login failed");
                self.state.send_replace(LoginState::Failed(e.clone()));
            }
        }
        result
    }

    async fn run(&self, address: &str, cancel: &CancellationToken) -> Result<String> {
        let connection = self
            .wallet
            .connection()
            .ok_or_else(|| GorillasError::PreconditionFailed("no wallet connected".into()))?;
        let requested = parse_address(address)?;
        if requested != connection.address {
            return Err(GorillasError::PreconditionFailed(format!(
                "{} is not the connected wallet {}",
                format_address(&requested),
                format_address(&connection.address)
            )));
        }

        let message = login_message(address);
        self.state.send_replace(LoginState::AwaitingSignature);
        let signature = self.await_signature(&message, cancel).await?;

        self.state.send_replace(LoginState::Exchanging);
        let response = self
            .http
            .login(&LoginRequest {
                address: address.to_string(),
                signature,
            })
            .await
            .map_err(exchange_error)?;

        self.state.send_replace(LoginState::Committing);
        self.tokens.set(&response.token)?;
        self.cache.invalidate_authenticated();

        info!(address = %format_address(&requested), "logged in");
        Ok(response.token)
    }

    async fn await_signature(&self, message: &str, cancel: &CancellationToken) -> Result<String> {
        let sign = self.wallet.sign_message(message);
        tokio::select! {
            _ = cancel.cancelled() => Err(GorillasError::Cancelled),
            result = with_optional_timeout(self.signature_timeout, sign) => result,
        }
    }
}

async fn with_optional_timeout<T>(
    limit: Option<Duration>,
    request: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, request)
            .await
            .map_err(|_| GorillasError::SignatureTimeout)?,
        None => request.await,
    }
}

/// Any failure of the token exchange, keeping the HTTP status when known.
fn exchange_error(e: GorillasError) -> GorillasError {
    match e {
        GorillasError::ExchangeFailed { .. } => e,
        other => GorillasError::ExchangeFailed {
            status: other.status(),
            message: other.to_string(),
        },
    }
}
