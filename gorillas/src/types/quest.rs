use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Quest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub progress: u64,
    pub target: u64,
    pub reward: u64,
    pub completed: bool,
    /// Not reported by every backend version; see [`Quest::is_claimed`].
    pub claimed: Option<bool>,
}

impl Quest {
    /// Backend claim flag, overlaid with ids claimed locally today.
    pub fn is_claimed(&self, locally_claimed: &BTreeSet<String>) -> bool {
        self.claimed.unwrap_or(false) || locally_claimed.contains(&self.id)
    }

    pub fn is_claimable(&self, locally_claimed: &BTreeSet<String>) -> bool {
        self.completed && !self.is_claimed(locally_claimed)
    }
}
