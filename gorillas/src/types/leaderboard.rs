use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub address: String,
    pub points: u64,
    pub total_flips: u64,
    pub wins: u64,
}
