//! Builds a [`Gorillas`] session for one CLI invocation.
//!
//! The session token and the local overlays persist in the storage file named
//! by the config; the wallet comes from `PRIVATE_KEY` and is connected per
//! invocation.

use std::sync::Arc;

use gorillas::{
    FileStorage, Gorillas, GorillasConfig, LocalKeyWallet, ReadOnlyWallet, Storage,
    WalletConnection, WalletConnector,
};
use tracing::info;

use crate::error::CliError;

/// Load the config from the environment and open the session.
pub fn create_client() -> Result<Gorillas, CliError> {
    let config = GorillasConfig::from_env()?;
    let storage = Arc::new(FileStorage::open(&config.storage_path)?);
    info!(
        api = %config.api_url,
        chain_id = config.chain_id,
        storage = %storage.path().display(),
        "gorillas client ready"
    );

    let connector: Arc<dyn WalletConnector> = match std::env::var("PRIVATE_KEY") {
        Ok(key) if !key.trim().is_empty() => Arc::new(LocalKeyWallet::new(&key, &config.rpc_url)?),
        _ => Arc::new(ReadOnlyWallet),
    };

    Ok(Gorillas::new(config, storage as Arc<dyn Storage>, connector)?)
}

/// Connect the wallet, failing with a clear message if none is configured.
pub async fn connect_wallet(gorillas: &Gorillas) -> Result<WalletConnection, CliError> {
    if let Some(connection) = gorillas.wallet().connection() {
        return Ok(connection);
    }
    match gorillas.wallet().connect().await {
        Ok(connection) => Ok(connection),
        Err(gorillas::GorillasError::PreconditionFailed(_)) => Err(CliError::MissingPrivateKey),
        Err(e) => Err(e.into()),
    }
}

pub fn require_login(gorillas: &Gorillas) -> Result<(), CliError> {
    if gorillas.is_logged_in() {
        Ok(())
    } else {
        Err(CliError::NotLoggedIn)
    }
}
