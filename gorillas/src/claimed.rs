//! Locally tracked claimed quest ids, per wallet address.
//!
//! The quests endpoint does not always report whether a quest was already
//! claimed, so claims made from this client are remembered here and overlaid
//! on the backend data. The set resets at UTC midnight: when the persisted
//! timestamp predates the most recent midnight, the entry is discarded.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::storage::{keys, Storage};

/// Persisted form of one address's claimed set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClaimedTaskSet {
    pub ids: BTreeSet<String>,
    /// Last write, in Unix milliseconds.
    pub timestamp: i64,
}

/// Most recent UTC midnight at or before `now`.
pub fn last_utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&now.date_naive().and_time(NaiveTime::MIN))
}

#[derive(Debug, Clone)]
pub struct ClaimedTasks {
    storage: Arc<dyn Storage>,
}

impl ClaimedTasks {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Claimed ids for `address` as of `now`, applying the daily reset.
    pub fn load(&self, address: &str, now: DateTime<Utc>) -> Result<BTreeSet<String>> {
        let key = keys::claimed_tasks(address);
        let Some(raw) = self.storage.get(&key) else {
            return Ok(BTreeSet::new());
        };

        let set: ClaimedTaskSet = match serde_json::from_str(&raw) {
            Ok(set) => set,
            Err(e) => {
                warn!(%address, error = %e, "discarding unreadable claimed task set");
                self.storage.remove(&key)?;
                return Ok(BTreeSet::new());
            }
        };

        if set.timestamp < last_utc_midnight(now).timestamp_millis() {
            debug!(%address, "claimed task set expired at UTC midnight");
            self.storage.remove(&key)?;
            return Ok(BTreeSet::new());
        }

        Ok(set.ids)
    }

    /// Record a claim of `quest_id` by `address`.
    pub fn mark_claimed(&self, address: &str, quest_id: &str, now: DateTime<Utc>) -> Result<()> {
        let mut ids = self.load(address, now)?;
        ids.insert(quest_id.to_string());
        let set = ClaimedTaskSet {
            ids,
            timestamp: now.timestamp_millis(),
        };
        self.storage
            .set(&keys::claimed_tasks(address), &serde_json::to_string(&set)?)
    }

    pub fn is_claimed(&self, address: &str, quest_id: &str, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.load(address, now)?.contains(quest_id))
    }

    pub fn clear(&self, address: &str) -> Result<()> {
        self.storage.remove(&keys::claimed_tasks(address))
    }
}
