//! Writes. Each one invalidates the reads it affects once the backend
//! accepts it; failures are returned as-is and nothing is retried.

use chrono::Utc;
use tracing::{info, warn};

use crate::cache::QueryKind;
use crate::client::Gorillas;
use crate::error::Result;
use crate::referral::{decide, ReferralDecision};
use crate::types::{ClaimResponse, ReferralSubmission};
use crate::wallet::format_address;

impl Gorillas {
    pub async fn claim_achievement(&self, achievement_id: &str) -> Result<ClaimResponse> {
        let result = self.http.claim_achievement(achievement_id).await;
        let response = self.guard(result).await?;
        self.cache
            .invalidate(&[QueryKind::Achievements, QueryKind::UserStats]);
        info!(achievement_id, "achievement claimed");
        Ok(response)
    }

    /// Claim a quest reward and remember the claim locally for the rest of
    /// the UTC day.
    pub async fn claim_task(&self, quest_id: &str) -> Result<ClaimResponse> {
        let result = self.http.claim_quest(quest_id).await;
        let response = self.guard(result).await?;
        self.cache.invalidate(&[QueryKind::Quests, QueryKind::UserStats]);

        match self.wallet.address() {
            Some(address) => {
                self.claimed
                    .mark_claimed(&format_address(&address), quest_id, Utc::now())?;
            }
            None => warn!(quest_id, "no wallet connected, claim not tracked locally"),
        }
        info!(quest_id, "quest claimed");
        Ok(response)
    }

    /// Submit a referral code. Without a session token the public
    /// submission path is used.
    pub async fn submit_referral(&self, code: &str) -> Result<ReferralSubmission> {
        let result = if self.tokens.is_logged_in() {
            self.http.submit_referral(code).await
        } else {
            self.http.submit_referral_public(code).await
        };
        let submission = self.guard(result).await?;
        self.cache.invalidate(&[QueryKind::ReferralInfo]);
        info!(code, "referral submitted");
        Ok(submission)
    }

    /// Act on the pending referral code, if any. A code is only submitted
    /// once the user is logged in and Discord-verified; it is cleared after
    /// a successful submission.
    pub async fn process_pending_referral(&self) -> Result<ReferralDecision> {
        let pending = self.referral.get();
        let logged_in = self.tokens.is_logged_in();
        let verified = match (&pending, logged_in) {
            (Some(_), true) => self
                .discord_status(false)
                .await?
                .is_some_and(|status| status.verified),
            _ => false,
        };

        let decision = decide(pending, logged_in, verified);
        if let ReferralDecision::Submit(code) = &decision {
            self.submit_referral(code).await?;
            self.referral.clear()?;
        }
        Ok(decision)
    }

    /// The user declined to use the pending referral code.
    pub fn dismiss_pending_referral(&self) -> Result<()> {
        self.referral.clear()
    }
}
