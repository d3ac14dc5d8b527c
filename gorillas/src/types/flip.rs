use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlipRecord {
    pub tx_hash: String,
    pub address: String,
    /// `true` for heads.
    pub guess: bool,
    pub result: bool,
    pub won: bool,
    /// Wager in wei, as a decimal string.
    pub amount: String,
    pub created_at: Option<String>,
}

/// Remaining flips for today.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct FlipCount {
    pub remaining: u32,
    pub daily_limit: u32,
    pub used: u32,
}
