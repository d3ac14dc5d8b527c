use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health of the backend's chain event listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PollingStatus {
    pub is_running: bool,
    pub last_poll_time: Option<DateTime<Utc>>,
    pub last_block: Option<u64>,
    pub error: Option<String>,
}
