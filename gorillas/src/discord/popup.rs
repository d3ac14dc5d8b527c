//! Popup windows and the messages exchanged between the OAuth popup and the
//! window that opened it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Message type posted by the callback page on success.
pub const DISCORD_AUTH_SUCCESS: &str = "DISCORD_AUTH_SUCCESS";
/// Message type posted by the callback page on failure.
pub const DISCORD_AUTH_ERROR: &str = "DISCORD_AUTH_ERROR";

/// Outcome reported by the callback page to its opener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum DiscordAuthMessage {
    #[serde(rename = "DISCORD_AUTH_SUCCESS")]
    Success {
        #[serde(default)]
        data: Value,
    },
    #[serde(rename = "DISCORD_AUTH_ERROR")]
    Error {
        #[serde(default)]
        error: String,
    },
}

/// A cross-window message as received, before any origin check.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowMessage {
    pub origin: String,
    pub payload: Value,
}

impl WindowMessage {
    pub fn new(origin: impl Into<String>, message: &DiscordAuthMessage) -> Result<Self> {
        Ok(Self {
            origin: origin.into(),
            payload: serde_json::to_value(message)?,
        })
    }

    /// The Discord auth message carried, if `origin` matches and the payload
    /// is one.
    pub fn auth_message(&self, expected_origin: &str) -> Option<DiscordAuthMessage> {
        if self.origin != expected_origin {
            return None;
        }
        serde_json::from_value(self.payload.clone()).ok()
    }
}

/// Handle to an open popup window.
pub trait PopupWindow: Send + Sync {
    fn is_closed(&self) -> bool;

    fn close(&self);
}

/// An opened popup plus the stream of messages posted to its opener.
pub struct OpenedPopup {
    pub window: Box<dyn PopupWindow>,
    pub messages: mpsc::UnboundedReceiver<WindowMessage>,
}

impl std::fmt::Debug for OpenedPopup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenedPopup")
            .field("closed", &self.window.is_closed())
            .finish()
    }
}

/// Opens popup windows. Fails with
/// [`GorillasError::PopupBlocked`](crate::GorillasError::PopupBlocked) when
/// the environment refuses.
pub trait PopupOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<OpenedPopup>;
}

/// The callback page's view of the window that opened it.
pub trait OpenerChannel: Send + Sync {
    /// Post `message`, delivered only if the opener's origin is
    /// `target_origin`.
    fn post_message(&self, message: &DiscordAuthMessage, target_origin: &str) -> Result<()>;

    /// Close the popup the callback page is running in.
    fn close_self(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_format() {
        let success = DiscordAuthMessage::Success {
            data: json!({"username": "gorilla"}),
        };
        assert_eq!(
            serde_json::to_value(&success).unwrap(),
            json!({"type": "DISCORD_AUTH_SUCCESS", "data": {"username": "gorilla"}})
        );

        let error: DiscordAuthMessage =
            serde_json::from_value(json!({"type": DISCORD_AUTH_ERROR, "error": "denied"})).unwrap();
        assert_eq!(
            error,
            DiscordAuthMessage::Error {
                error: "denied".into()
            }
        );
    }

    #[test]
    fn test_origin_mismatch_ignored() {
        let message = WindowMessage::new(
            "https://evil.example",
            &DiscordAuthMessage::Success { data: Value::Null },
        )
        .unwrap();
        assert_eq!(message.auth_message("http://localhost:3000"), None);
        assert!(message.auth_message("https://evil.example").is_some());
    }

    #[test]
    fn test_foreign_payload_ignored() {
        let message = WindowMessage {
            origin: "http://localhost:3000".into(),
            payload: json!({"type": "SOMETHING_ELSE"}),
        };
        assert_eq!(message.auth_message("http://localhost:3000"), None);
    }
}
