use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub address: String,
    pub total_flips: u64,
    pub wins: u64,
    pub losses: u64,
    pub current_streak: i64,
    pub best_streak: u64,
    pub points: u64,
    /// Total wagered, in wei, as a decimal string.
    pub total_wagered: String,
}

impl UserStats {
    /// Win ratio in `[0, 1]`; zero before the first flip.
    pub fn win_rate(&self) -> f64 {
        if self.total_flips == 0 {
            return 0.0;
        }
        self.wins as f64 / self.total_flips as f64
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GlobalStats {
    pub total_flips: u64,
    pub total_players: u64,
    pub total_wagered: String,
    pub heads_count: u64,
    pub tails_count: u64,
}
