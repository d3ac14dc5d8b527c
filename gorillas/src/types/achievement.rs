use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub points: u64,
    pub unlocked: bool,
    pub claimed: bool,
}

impl Achievement {
    pub fn is_claimable(&self) -> bool {
        self.unlocked && !self.claimed
    }
}

/// Response of the claim endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClaimResponse {
    pub success: bool,
    pub message: Option<String>,
    pub points: Option<u64>,
}
