use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralInfo {
    pub referral_code: String,
    pub referred_by: Option<String>,
    pub referral_count: u64,
    pub points_earned: u64,
}

/// Body of `POST /referrals`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequest {
    pub referral_code: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferralSubmission {
    pub success: bool,
    pub message: Option<String>,
}
