use std::future::Future;
use std::time::Duration;

use crate::error::{GorillasError, Result};
use crate::rest::GorillasHttpClient;
use crate::types::*;

/// Extra bound on Discord requests, on top of the client timeout.
pub const DISCORD_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

impl GorillasHttpClient {
    // --- Auth ---

    /// POST /auth/login - Exchange a signed challenge for a session token.
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.post_public("/auth/login", request).await
    }

    // --- Stats ---

    /// GET /stats/me - Stats of the logged-in player.
    pub async fn get_user_stats(&self) -> Result<UserStats> {
        self.get("/stats/me", &[]).await
    }

    /// GET /stats/global - Game-wide totals.
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        self.get_public("/stats/global", &[]).await
    }

    /// GET /stats/flip-history/me - Flips of the logged-in player.
    pub async fn get_flip_history(&self) -> Result<Vec<FlipRecord>> {
        self.get("/stats/flip-history/me", &[]).await
    }

    /// GET /stats/flip-history/global - Recent flips of all players.
    pub async fn get_global_flip_history(&self) -> Result<Vec<FlipRecord>> {
        self.get_public("/stats/flip-history/global", &[]).await
    }

    /// GET /stats/flip-count/me - Flips left today.
    pub async fn get_flip_count(&self) -> Result<FlipCount> {
        self.get("/stats/flip-count/me", &[]).await
    }

    // --- Achievements ---

    /// GET /achievements/me
    pub async fn get_achievements(&self) -> Result<Vec<Achievement>> {
        self.get("/achievements/me", &[]).await
    }

    /// POST /achievements/claim/{id}
    pub async fn claim_achievement(&self, achievement_id: &str) -> Result<ClaimResponse> {
        self.post(&format!("/achievements/claim/{}", segment(achievement_id)))
            .await
    }

    // --- Quests ---

    /// GET /quests/{address}
    pub async fn get_quests(&self, address: &str) -> Result<Vec<Quest>> {
        self.get(&format!("/quests/{}", segment(address)), &[]).await
    }

    /// POST /quests/claim/{quest_id}
    pub async fn claim_quest(&self, quest_id: &str) -> Result<ClaimResponse> {
        self.post(&format!("/quests/claim/{}", segment(quest_id)))
            .await
    }

    // --- Referrals ---

    /// GET /referrals/me
    pub async fn get_referral_info(&self) -> Result<ReferralInfo> {
        self.get("/referrals/me", &[]).await
    }

    /// POST /referrals - Authenticated submission.
    pub async fn submit_referral(&self, code: &str) -> Result<ReferralSubmission> {
        let body = ReferralRequest {
            referral_code: code.to_string(),
        };
        self.post_json("/referrals", &body).await
    }

    /// POST /referrals - Submission without a session.
    pub async fn submit_referral_public(&self, code: &str) -> Result<ReferralSubmission> {
        let body = ReferralRequest {
            referral_code: code.to_string(),
        };
        self.post_public("/referrals", &body).await
    }

    // --- Leaderboard ---

    /// GET /leaderboard
    pub async fn get_leaderboard(&self) -> Result<Vec<LeaderboardEntry>> {
        self.get_public("/leaderboard", &[]).await
    }

    // --- Discord ---

    /// GET /discord/status
    pub async fn get_discord_status(&self) -> Result<DiscordStatus> {
        with_discord_timeout(self.get("/discord/status", &[])).await
    }

    /// GET /discord/auth-url - OAuth authorization URL for the popup.
    pub async fn get_discord_auth_url(&self) -> Result<DiscordAuthUrl> {
        with_discord_timeout(self.get("/discord/auth-url", &[])).await
    }

    /// DELETE /discord/unlink
    pub async fn unlink_discord(&self) -> Result<serde_json::Value> {
        with_discord_timeout(self.delete("/discord/unlink")).await
    }

    /// GET /discord/callback?code=&state= - Complete the OAuth exchange.
    ///
    /// The OAuth `state` identifies the user, so no token is attached.
    pub async fn discord_callback(
        &self,
        code: &str,
        state: &str,
    ) -> Result<DiscordCallbackResult> {
        let query = [("code", code), ("state", state)];
        with_discord_timeout(self.get_public("/discord/callback", &query))
            .await
    }

    // --- Diagnostics ---

    /// GET /polling/status - Health of the backend chain listener.
    pub async fn get_polling_status(&self) -> Result<PollingStatus> {
        self.get_public("/polling/status", &[]).await
    }
}

async fn with_discord_timeout<T>(request: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(DISCORD_REQUEST_TIMEOUT, request)
        .await
        .map_err(|_| GorillasError::Timeout)?
}

/// Percent-encode one path segment.
fn segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
