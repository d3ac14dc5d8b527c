//! Cached reads. Every method returns `Ok(None)` while the read is disabled
//! (no durable storage, or no token for an authenticated resource); nothing
//! is requested or cached in that case.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::cache::QueryKey;
use crate::client::Gorillas;
use crate::error::Result;
use crate::types::*;
use crate::wallet::format_address;

impl Gorillas {
    async fn query<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<Option<Arc<T>>>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if !self.query_enabled(key.kind()) {
            debug!(%key, "query disabled");
            return Ok(None);
        }
        let result = self.cache.fetch(key, fetcher).await;
        self.guard(result).await.map(Some)
    }

    pub async fn user_stats(&self) -> Result<Option<Arc<UserStats>>> {
        let http = self.http.clone();
        self.query(QueryKey::UserStats, move || {
            let http = http.clone();
            async move { http.get_user_stats().await }
        })
        .await
    }

    pub async fn global_stats(&self) -> Result<Option<Arc<GlobalStats>>> {
        let http = self.http.clone();
        self.query(QueryKey::GlobalStats, move || {
            let http = http.clone();
            async move { http.get_global_stats().await }
        })
        .await
    }

    pub async fn achievements(&self) -> Result<Option<Arc<Vec<Achievement>>>> {
        let http = self.http.clone();
        self.query(QueryKey::Achievements, move || {
            let http = http.clone();
            async move { http.get_achievements().await }
        })
        .await
    }

    /// Quests for `address`. Use [`Gorillas::locally_claimed`] to overlay
    /// claims made from this client.
    pub async fn quests(&self, address: &str) -> Result<Option<Arc<Vec<Quest>>>> {
        let http = self.http.clone();
        let address = address.to_string();
        self.query(QueryKey::quests(&address), move || {
            let http = http.clone();
            let address = address.clone();
            async move { http.get_quests(&address).await }
        })
        .await
    }

    /// Quests for the connected wallet.
    pub async fn my_quests(&self) -> Result<Option<Arc<Vec<Quest>>>> {
        let connection = self.require_connection()?;
        self.quests(&format_address(&connection.address)).await
    }

    /// Quest ids claimed from this client today by `address`.
    pub fn locally_claimed(&self, address: &str) -> Result<BTreeSet<String>> {
        self.claimed.load(address, Utc::now())
    }

    pub async fn referral_info(&self) -> Result<Option<Arc<ReferralInfo>>> {
        let http = self.http.clone();
        self.query(QueryKey::ReferralInfo, move || {
            let http = http.clone();
            async move { http.get_referral_info().await }
        })
        .await
    }

    pub async fn flip_history(&self) -> Result<Option<Arc<Vec<FlipRecord>>>> {
        let http = self.http.clone();
        self.query(QueryKey::FlipHistory, move || {
            let http = http.clone();
            async move { http.get_flip_history().await }
        })
        .await
    }

    pub async fn global_flip_history(&self) -> Result<Option<Arc<Vec<FlipRecord>>>> {
        let http = self.http.clone();
        self.query(QueryKey::GlobalFlipHistory, move || {
            let http = http.clone();
            async move { http.get_global_flip_history().await }
        })
        .await
    }

    pub async fn flip_count(&self) -> Result<Option<Arc<FlipCount>>> {
        let http = self.http.clone();
        self.query(QueryKey::FlipCount, move || {
            let http = http.clone();
            async move { http.get_flip_count().await }
        })
        .await
    }

    pub async fn leaderboard(&self) -> Result<Option<Arc<Vec<LeaderboardEntry>>>> {
        let http = self.http.clone();
        self.query(QueryKey::Leaderboard, move || {
            let http = http.clone();
            async move { http.get_leaderboard().await }
        })
        .await
    }

    /// Discord link status, cached for five minutes. `force` bypasses the
    /// cache.
    pub async fn discord_status(&self, force: bool) -> Result<Option<Arc<DiscordStatus>>> {
        if force {
            self.cache.invalidate_key(&QueryKey::DiscordStatus);
        }
        let http = self.http.clone();
        self.query(QueryKey::DiscordStatus, move || {
            let http = http.clone();
            async move { http.get_discord_status().await }
        })
        .await
    }
}
