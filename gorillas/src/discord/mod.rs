//! Discord verification through an OAuth popup.
//!
//! The flow runs `Idle -> AwaitingAuthUrl -> PopupOpen -> Resolved`. While the
//! popup is open three signals race and the first one wins: a message from the
//! callback page, the user closing the popup, or the five-minute timeout.
//! Explicit cancellation is a fourth exit. Whichever fires, the popup handle
//! is released exactly once and the interval and timeout timers are dropped
//! with the race.

pub mod callback;
pub mod popup;

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::QueryKey;
use crate::client::Gorillas;
use crate::error::{GorillasError, Result};
use crate::types::DiscordStatus;

pub use callback::{callback_params, CallbackParams, CALLBACK_CLOSE_DELAY};
pub use popup::{
    DiscordAuthMessage, OpenedPopup, OpenerChannel, PopupOpener, PopupWindow, WindowMessage,
};

/// Upper bound on the popup staying open.
pub const POPUP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// How often the popup is checked for having been closed.
pub const POPUP_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingAuthUrl,
    PopupOpen,
    Resolved,
}

/// The signal that ended the popup race.
#[derive(Debug, Clone, PartialEq)]
pub enum PopupSignal {
    Message(DiscordAuthMessage),
    Closed,
    TimedOut,
    Cancelled,
}

/// Whether and how the verification prompt is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPolicy {
    NotRequired,
    /// Shown with a skip option (no session yet).
    Skippable,
    /// Logged in but unverified: cannot be dismissed.
    Blocking,
}

pub fn prompt_policy(logged_in: bool, status: Option<&DiscordStatus>) -> PromptPolicy {
    match (logged_in, status) {
        (_, Some(status)) if status.verified => PromptPolicy::NotRequired,
        (true, _) => PromptPolicy::Blocking,
        (false, _) => PromptPolicy::Skippable,
    }
}

/// Owns the popup handle for the duration of the race.
struct PopupGuard {
    window: Mutex<Option<Box<dyn PopupWindow>>>,
}

impl PopupGuard {
    fn new(window: Box<dyn PopupWindow>) -> Self {
        Self {
            window: Mutex::new(Some(window)),
        }
    }

    fn is_closed(&self) -> bool {
        self.window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or(true, |window| window.is_closed())
    }

    /// Close the popup if it is still open. Only the first call has any
    /// effect.
    fn release(&self) {
        let window = self
            .window
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(window) = window {
            if !window.is_closed() {
                window.close();
            }
            debug!("discord popup released");
        }
    }
}

impl Drop for PopupGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Wait for the first of: an auth message from `app_origin`, the popup being
/// closed, `timeout`, or `cancel`. The popup is closed on every exit.
pub async fn race_popup(
    popup: OpenedPopup,
    app_origin: &str,
    cancel: &CancellationToken,
    timeout: Duration,
    poll_interval: Duration,
) -> PopupSignal {
    let OpenedPopup {
        window,
        mut messages,
    } = popup;
    let guard = PopupGuard::new(window);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut poll = interval_at(Instant::now() + poll_interval, poll_interval);
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut messages_open = true;

    let signal = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break PopupSignal::Cancelled,
            received = messages.recv(), if messages_open => match received {
                Some(message) => match message.auth_message(app_origin) {
                    Some(auth) => break PopupSignal::Message(auth),
                    None => debug!(origin = %message.origin, "ignoring window message"),
                },
                None => messages_open = false,
            },
            _ = poll.tick() => {
                if guard.is_closed() {
                    break PopupSignal::Closed;
                }
            }
            _ = &mut deadline => break PopupSignal::TimedOut,
        }
    };

    guard.release();
    signal
}

impl Gorillas {
    pub fn discord_flow_state(&self) -> FlowState {
        *self.discord_flow.borrow()
    }

    pub fn subscribe_discord_flow(&self) -> tokio::sync::watch::Receiver<FlowState> {
        self.discord_flow.subscribe()
    }

    /// Link a Discord account through an OAuth popup opened with `opener`.
    ///
    /// Resolves with the fresh link status on success. A popup closed without
    /// completing verification is [`GorillasError::Cancelled`]; the five-minute
    /// limit is [`GorillasError::Timeout`].
    pub async fn verify_discord(
        &self,
        opener: &dyn PopupOpener,
        cancel: &CancellationToken,
    ) -> Result<DiscordStatus> {
        let result = self.run_discord_flow(opener, cancel).await;
        self.discord_flow.send_replace(FlowState::Resolved);
        match &result {
            Ok(_) => info!("discord verified"),
            Err(e) => warn!(error = %e, "discord verification failed"),
        }
        result
    }

    async fn run_discord_flow(
        &self,
        opener: &dyn PopupOpener,
        cancel: &CancellationToken,
    ) -> Result<DiscordStatus> {
        self.discord_flow.send_replace(FlowState::AwaitingAuthUrl);
        let result = self.http.get_discord_auth_url().await;
        let auth = self.guard(result).await?;
        if cancel.is_cancelled() {
            return Err(GorillasError::Cancelled);
        }

        let popup = opener.open(&auth.url)?;
        self.discord_flow.send_replace(FlowState::PopupOpen);
        let signal = race_popup(
            popup,
            &self.config.app_origin,
            cancel,
            POPUP_TIMEOUT,
            POPUP_POLL_INTERVAL,
        )
        .await;
        debug!(?signal, "discord popup resolved");

        match signal {
            PopupSignal::Message(DiscordAuthMessage::Success { .. }) => {
                let status = self.refreshed_discord_status().await?;
                if status.verified {
                    Ok(status)
                } else {
                    Err(GorillasError::Verification(
                        "backend reports the account as unverified".into(),
                    ))
                }
            }
            PopupSignal::Message(DiscordAuthMessage::Error { error }) => {
                self.cache.invalidate_key(&QueryKey::DiscordStatus);
                Err(GorillasError::Verification(error))
            }
            PopupSignal::Closed => {
                let status = self.refreshed_discord_status().await?;
                if status.verified {
                    Ok(status)
                } else {
                    Err(GorillasError::Cancelled)
                }
            }
            PopupSignal::TimedOut => Err(GorillasError::Timeout),
            PopupSignal::Cancelled => Err(GorillasError::Cancelled),
        }
    }

    async fn refreshed_discord_status(&self) -> Result<DiscordStatus> {
        let status = self
            .discord_status(true)
            .await?
            .ok_or_else(|| GorillasError::PreconditionFailed("not logged in".into()))?;
        Ok(DiscordStatus::clone(&status))
    }

    /// Unlink the Discord account. The session ends with it.
    pub async fn unlink_discord(&self) -> Result<()> {
        let result = self.http.unlink_discord().await;
        self.guard(result).await?;
        self.cache.invalidate_key(&QueryKey::DiscordStatus);
        info!("discord unlinked");
        self.logout().await
    }

    /// How the verification prompt should be presented right now.
    pub async fn discord_prompt_policy(&self) -> Result<PromptPolicy> {
        let logged_in = self.tokens.is_logged_in();
        let status = if logged_in {
            self.discord_status(false).await?
        } else {
            None
        };
        Ok(prompt_policy(logged_in, status.as_deref()))
    }
}
