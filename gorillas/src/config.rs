use std::path::PathBuf;
use std::time::Duration;

use ethers::types::{Address, U256};

use crate::error::{GorillasError, Result};

/// Client-side timeout applied to every backend request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound on waiting for the wallet to sign the login challenge.
pub const SIGNATURE_TIMEOUT: Duration = Duration::from_secs(120);

/// Flip fee in wei (0.001 ETH).
pub const DEFAULT_FLIP_FEE_WEI: u64 = 1_000_000_000_000_000;

/// Configuration for the Some Gorillas client.
#[derive(Debug, Clone)]
pub struct GorillasConfig {
    /// Base URL of the backend API (e.g. `http://localhost:3001`).
    pub api_url: String,
    /// JSON-RPC endpoint of the chain the game contract lives on.
    pub rpc_url: String,
    /// Chain id the app expects the wallet to be connected to.
    pub chain_id: u64,
    /// Coin-flip contract. Only required once a wager is placed.
    pub contract_address: Option<Address>,
    /// Fixed fee sent with every `flipCoin` call.
    pub flip_fee_wei: U256,
    /// Origin accepted for cross-window messages from the OAuth popup.
    pub app_origin: String,
    /// File backing durable client storage.
    pub storage_path: PathBuf,
    /// Timeout for backend requests.
    pub http_timeout: Duration,
    /// Timeout for the login signature request; `None` waits indefinitely.
    pub signature_timeout: Option<Duration>,
}

impl Default for GorillasConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3001".into(),
            rpc_url: "http://localhost:8545".into(),
            chain_id: 31337,
            contract_address: None,
            flip_fee_wei: U256::from(DEFAULT_FLIP_FEE_WEI),
            app_origin: "http://localhost:3000".into(),
            storage_path: default_storage_path(),
            http_timeout: HTTP_TIMEOUT,
            signature_timeout: Some(SIGNATURE_TIMEOUT),
        }
    }
}

impl GorillasConfig {
    /// Build a config from `GORILLAS_*` environment variables, falling back to
    /// [`GorillasConfig::default`] for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env("GORILLAS_API_URL") {
            config.api_url = v;
        }
        if let Some(v) = env("GORILLAS_RPC_URL") {
            config.rpc_url = v;
        }
        if let Some(v) = env("GORILLAS_CHAIN_ID") {
            config.chain_id = v
                .parse()
                .map_err(|e| GorillasError::Config(format!("GORILLAS_CHAIN_ID: {e}")))?;
        }
        if let Some(v) = env("GORILLAS_CONTRACT_ADDRESS") {
            let address = v
                .parse::<Address>()
                .map_err(|e| GorillasError::Config(format!("GORILLAS_CONTRACT_ADDRESS: {e}")))?;
            config.contract_address = Some(address);
        }
        if let Some(v) = env("GORILLAS_FLIP_FEE_WEI") {
            config.flip_fee_wei = U256::from_dec_str(&v)
                .map_err(|e| GorillasError::Config(format!("GORILLAS_FLIP_FEE_WEI: {e}")))?;
        }
        if let Some(v) = env("GORILLAS_APP_ORIGIN") {
            config.app_origin = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = env("GORILLAS_STORAGE_PATH") {
            config.storage_path = PathBuf::from(v);
        }
        if let Some(v) = env("GORILLAS_SIGNATURE_TIMEOUT_SECS") {
            let secs: u64 = v.parse().map_err(|e| {
                GorillasError::Config(format!("GORILLAS_SIGNATURE_TIMEOUT_SECS: {e}"))
            })?;
            config.signature_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        Ok(config)
    }
}

/// `<data dir>/some-gorillas/storage.json`, or `./some-gorillas-storage.json`
/// when the platform has no data directory.
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("some-gorillas").join("storage.json"))
        .unwrap_or_else(|| PathBuf::from("some-gorillas-storage.json"))
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
