//! The OAuth callback page: runs inside the popup, exchanges the
//! authorization code, reports the outcome to the opener and closes itself.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use super::popup::{DiscordAuthMessage, OpenerChannel};
use crate::cache::QueryKey;
use crate::client::Gorillas;

/// How long the callback page stays open after reporting.
pub const CALLBACK_CLOSE_DELAY: Duration = Duration::from_secs(3);

/// Query parameters Discord redirects back with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set when the user denied access on Discord's side.
    pub error: Option<String>,
}

pub fn callback_params(url: &Url) -> CallbackParams {
    let mut params = CallbackParams::default();
    for (name, value) in url.query_pairs() {
        let value = value.into_owned();
        match name.as_ref() {
            "code" => params.code = Some(value),
            "state" => params.state = Some(value),
            "error" => params.error = Some(value),
            _ => {}
        }
    }
    params
}

impl Gorillas {
    /// Complete the OAuth redirect at `url`. When running in a popup the
    /// outcome is posted to `opener` (restricted to the app origin) and the
    /// popup closes after [`CALLBACK_CLOSE_DELAY`].
    pub async fn handle_discord_callback(
        &self,
        url: &Url,
        opener: Option<&dyn OpenerChannel>,
    ) -> DiscordAuthMessage {
        let message = self.exchange_discord_code(&callback_params(url)).await;

        if let Some(opener) = opener {
            if let Err(e) = opener.post_message(&message, &self.config.app_origin) {
                warn!(error = %e, "failed to notify opener window");
            }
            tokio::time::sleep(CALLBACK_CLOSE_DELAY).await;
            opener.close_self();
        }
        message
    }

    async fn exchange_discord_code(&self, params: &CallbackParams) -> DiscordAuthMessage {
        if let Some(error) = &params.error {
            return DiscordAuthMessage::Error {
                error: error.clone(),
            };
        }
        let (Some(code), Some(state)) = (&params.code, &params.state) else {
            return DiscordAuthMessage::Error {
                error: "missing code or state".into(),
            };
        };

        match self.http.discord_callback(code, state).await {
            Ok(result) if result.success => {
                self.cache.invalidate_key(&QueryKey::DiscordStatus);
                info!("discord callback accepted");
                DiscordAuthMessage::Success {
                    data: serde_json::to_value(&result.discord_user).unwrap_or(Value::Null),
                }
            }
            Ok(result) => DiscordAuthMessage::Error {
                error: result
                    .error
                    .unwrap_or_else(|| "verification rejected".into()),
            },
            Err(e) => DiscordAuthMessage::Error {
                error: e.to_string(),
            },
        }
    }
}
