//! Wallet connector abstraction and the observable connection state.
//!
//! A [`WalletConnector`] is whatever actually holds the keys (a browser
//! extension, a hardware device, [`LocalKeyWallet`]). [`WalletAdapter`] wraps
//! one and publishes the single active [`WalletConnection`] on a `watch`
//! channel.

pub mod local;

use std::sync::Arc;

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use ethers::utils::to_checksum;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::{GorillasError, Result};

pub use local::LocalKeyWallet;

/// A live binding to a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletConnection {
    pub address: Address,
    pub chain_id: u64,
}

impl WalletConnection {
    /// Checksummed `0x` address, as wallets present it.
    pub fn address_string(&self) -> String {
        to_checksum(&self.address, None)
    }
}

/// Receipt of a confirmed `flipCoin` transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlipReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    pub success: bool,
}

/// Lowercase `0x` hex of an address, used for storage and cache keys.
pub fn format_address(address: &Address) -> String {
    format!("{address:#x}")
}

/// Parse a `0x` address; hex case is ignored.
pub fn parse_address(value: &str) -> Result<Address> {
    value
        .trim()
        .parse::<Address>()
        .map_err(|e| GorillasError::PreconditionFailed(format!("invalid address {value}: {e}")))
}

/// Operations a wallet must provide.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Ask the wallet for account access. Resolves once the connection is
    /// confirmed.
    async fn connect(&self) -> Result<WalletConnection>;

    async fn disconnect(&self) -> Result<()>;

    /// EIP-191 `personal_sign` of `message` by `address`; returns `0x` hex.
    async fn sign_message(&self, address: Address, message: &str) -> Result<String>;

    /// Submit `flipCoin(guess)` to `contract` with `fee` attached.
    async fn send_flip(&self, contract: Address, guess: bool, fee: U256) -> Result<TxHash>;

    async fn wait_for_receipt(&self, tx_hash: TxHash, confirmations: usize) -> Result<FlipReceipt>;
}

/// Connector for sessions without a wallet. Public reads and a stored token
/// keep working; anything that needs a key fails with
/// [`GorillasError::PreconditionFailed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyWallet;

fn no_wallet() -> GorillasError {
    GorillasError::PreconditionFailed("no wallet configured".into())
}

#[async_trait]
impl WalletConnector for ReadOnlyWallet {
    async fn connect(&self) -> Result<WalletConnection> {
        Err(no_wallet())
    }

    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    async fn sign_message(&self, _address: Address, _message: &str) -> Result<String> {
        Err(no_wallet())
    }

    async fn send_flip(&self, _contract: Address, _guess: bool, _fee: U256) -> Result<TxHash> {
        Err(no_wallet())
    }

    async fn wait_for_receipt(
        &self,
        _tx_hash: TxHash,
        _confirmations: usize,
    ) -> Result<FlipReceipt> {
        Err(no_wallet())
    }
}

/// Observable wallet connection state over a [`WalletConnector`].
pub struct WalletAdapter {
    connector: Arc<dyn WalletConnector>,
    state: watch::Sender<Option<WalletConnection>>,
}

impl WalletAdapter {
    pub fn new(connector: Arc<dyn WalletConnector>) -> Self {
        let (state, _) = watch::channel(None);
        Self { connector, state }
    }

    /// Connect, replacing any existing connection.
    pub async fn connect(&self) -> Result<WalletConnection> {
        if let Some(existing) = self.connection() {
            info!(address = %format_address(&existing.address), "replacing wallet connection");
            self.disconnect().await?;
        }

        let connection = self.connector.connect().await?;
        info!(
            address = %format_address(&connection.address),
            chain_id = connection.chain_id,
            "wallet connected"
        );
        self.state.send_replace(Some(connection));
        Ok(connection)
    }

    /// Disconnect. A no-op when nothing is connected.
    pub async fn disconnect(&self) -> Result<()> {
        if self.connection().is_none() {
            return Ok(());
        }
        let result = self.connector.disconnect().await;
        self.state.send_replace(None);
        info!("wallet disconnected");
        result
    }

    pub fn connection(&self) -> Option<WalletConnection> {
        *self.state.borrow()
    }

    pub fn address(&self) -> Option<Address> {
        self.connection().map(|c| c.address)
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.connection().map(|c| c.chain_id)
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<WalletConnection>> {
        self.state.subscribe()
    }

    /// Resolve once a connection is published.
    pub async fn wait_connected(&self) -> Result<WalletConnection> {
        let mut rx = self.state.subscribe();
        let connection = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| GorillasError::Wallet("wallet adapter dropped".into()))?;
        let connection = *connection;
        connection.ok_or_else(|| GorillasError::Wallet("wallet disconnected".into()))
    }

    /// The wallet switched accounts.
    pub fn handle_accounts_changed(&self, address: Option<Address>) {
        match (address, self.connection()) {
            (Some(address), Some(current)) => {
                info!(address = %format_address(&address), "wallet account changed");
                self.state.send_replace(Some(WalletConnection {
                    address,
                    chain_id: current.chain_id,
                }));
            }
            (None, Some(_)) => self.handle_revoked(),
            _ => {}
        }
    }

    /// The wallet switched networks.
    pub fn handle_chain_changed(&self, chain_id: u64) {
        self.state.send_if_modified(|state| match state {
            Some(connection) if connection.chain_id != chain_id => {
                info!(chain_id, "wallet chain changed");
                connection.chain_id = chain_id;
                true
            }
            _ => false,
        });
    }

    /// The wallet revoked access from its side.
    pub fn handle_revoked(&self) {
        if self.state.send_replace(None).is_some() {
            warn!("wallet access revoked");
        }
    }

    /// Sign with the connected account.
    pub async fn sign_message(&self, message: &str) -> Result<String> {
        let connection = self
            .connection()
            .ok_or_else(|| GorillasError::PreconditionFailed("no wallet connected".into()))?;
        self.connector.sign_message(connection.address, message).await
    }

    pub fn connector(&self) -> &Arc<dyn WalletConnector> {
        &self.connector
    }
}

impl std::fmt::Debug for WalletAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletAdapter")
            .field("connection", &self.connection())
            .finish()
    }
}
