use serde::{Deserialize, Serialize};

/// Linked Discord identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordUser {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub verified_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordStatus {
    pub verified: bool,
    pub discord_user: Option<DiscordUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscordAuthUrl {
    #[serde(alias = "authUrl")]
    pub url: String,
}

/// Result of exchanging the OAuth `code`/`state` pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct DiscordCallbackResult {
    pub success: bool,
    pub discord_user: Option<DiscordUser>,
    pub error: Option<String>,
}
