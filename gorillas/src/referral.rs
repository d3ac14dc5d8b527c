//! Referral codes captured from a landing URL and held until they can be
//! submitted.

use std::sync::Arc;

use tracing::info;
use url::Url;

use crate::error::Result;
use crate::storage::{keys, Storage};

/// Query parameter carrying a referral code.
pub const REFERRAL_QUERY_PARAM: &str = "ref";

/// What to do with a pending referral code right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferralDecision {
    /// No code is pending.
    Nothing,
    /// Keep the code until the user logs in.
    AwaitLogin(String),
    /// Logged in but unverified: open the Discord verification prompt first.
    RequireDiscord(String),
    /// Ready to submit.
    Submit(String),
}

/// Decide how to handle `pending` given the session state.
pub fn decide(
    pending: Option<String>,
    logged_in: bool,
    discord_verified: bool,
) -> ReferralDecision {
    match pending {
        None => ReferralDecision::Nothing,
        Some(code) if !logged_in => ReferralDecision::AwaitLogin(code),
        Some(code) if !discord_verified => ReferralDecision::RequireDiscord(code),
        Some(code) => ReferralDecision::Submit(code),
    }
}

/// Extract a referral code from a URL's query string.
pub fn code_from_url(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(name, _)| name == REFERRAL_QUERY_PARAM)
        .map(|(_, value)| value.trim().to_string())
        .filter(|code| !code.is_empty())
}

/// The persisted, not yet submitted referral code.
#[derive(Debug, Clone)]
pub struct PendingReferral {
    storage: Arc<dyn Storage>,
}

impl PendingReferral {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Capture `?ref=` from `url` if present. A new code replaces an older one.
    pub fn capture_from_url(&self, url: &Url) -> Result<Option<String>> {
        let Some(code) = code_from_url(url) else {
            return Ok(None);
        };
        self.set(&code)?;
        Ok(Some(code))
    }

    pub fn set(&self, code: &str) -> Result<()> {
        self.storage.set(keys::PENDING_REFERRAL, code)?;
        info!(code, "referral code pending");
        Ok(())
    }

    pub fn get(&self) -> Option<String> {
        self.storage
            .get(keys::PENDING_REFERRAL)
            .filter(|code| !code.is_empty())
    }

    /// Forget the code, after submission or on dismissal.
    pub fn clear(&self) -> Result<()> {
        self.storage.remove(keys::PENDING_REFERRAL)
    }
}
