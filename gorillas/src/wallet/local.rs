//! Wallet backed by a raw private key and an HTTP JSON-RPC provider.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ethers::abi::{self, Token};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, PendingTransaction, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest, TxHash, U256, U64};
use ethers::utils::id;
use tracing::debug;

use crate::error::{GorillasError, Result};
use crate::wallet::{format_address, FlipReceipt, WalletConnection, WalletConnector};

/// Solidity signature of the wager entry point.
pub const FLIP_COIN_SIGNATURE: &str = "flipCoin(bool)";

/// Encode calldata for `flipCoin(guess)`.
pub fn encode_flip_call(guess: bool) -> Bytes {
    let mut data = id(FLIP_COIN_SIGNATURE).to_vec();
    data.extend(abi::encode(&[Token::Bool(guess)]));
    Bytes::from(data)
}

/// A wallet holding its own key. Never prompts, so it never rejects.
pub struct LocalKeyWallet {
    wallet: LocalWallet,
    provider: Provider<Http>,
    connected: AtomicBool,
}

impl LocalKeyWallet {
    /// Create from a hex private key (with or without `0x`).
    pub fn new(private_key: &str, rpc_url: &str) -> Result<Self> {
        let wallet = private_key
            .trim()
            .trim_start_matches("0x")
            .parse::<LocalWallet>()
            .map_err(|e| GorillasError::Wallet(format!("invalid private key: {e}")))?;
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| GorillasError::Config(format!("invalid RPC URL {rpc_url}: {e}")))?;

        Ok(Self {
            wallet,
            provider,
            connected: AtomicBool::new(false),
        })
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    async fn chain_id(&self) -> Result<u64> {
        let chain_id = self
            .provider
            .get_chainid()
            .await
            .map_err(|e| GorillasError::Network(format!("eth_chainId failed: {e}")))?;
        Ok(chain_id.as_u64())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GorillasError::PreconditionFailed("wallet not connected".into()))
        }
    }
}

#[async_trait]
impl WalletConnector for LocalKeyWallet {
    async fn connect(&self) -> Result<WalletConnection> {
        let chain_id = self.chain_id().await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(WalletConnection {
            address: self.wallet.address(),
            chain_id,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_message(&self, address: Address, message: &str) -> Result<String> {
        self.ensure_connected()?;
        if address != self.wallet.address() {
            return Err(GorillasError::PreconditionFailed(format!(
                "wallet does not hold {}",
                format_address(&address)
            )));
        }
        let signature = self
            .wallet
            .sign_message(message)
            .await
            .map_err(|e| GorillasError::Wallet(format!("signing failed: {e}")))?;
        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }

    async fn send_flip(&self, contract: Address, guess: bool, fee: U256) -> Result<TxHash> {
        self.ensure_connected()?;
        let chain_id = self.chain_id().await?;
        let client = SignerMiddleware::new(
            self.provider.clone(),
            self.wallet.clone().with_chain_id(chain_id),
        );

        let tx = TransactionRequest::new()
            .from(self.wallet.address())
            .to(contract)
            .value(fee)
            .data(encode_flip_call(guess));

        let pending = client
            .send_transaction(tx, None)
            .await
            .map_err(|e| GorillasError::Wallet(format!("flipCoin submission failed: {e}")))?;
        let tx_hash = *pending;
        debug!(?tx_hash, guess, "flipCoin transaction sent");
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash, confirmations: usize) -> Result<FlipReceipt> {
        debug!(?tx_hash, confirmations, "waiting for receipt");
        let receipt = PendingTransaction::new(tx_hash, &self.provider)
            .confirmations(confirmations)
            .await
            .map_err(|e| GorillasError::Network(format!("receipt wait failed: {e}")))?
            .ok_or_else(|| GorillasError::Wallet(format!("transaction {tx_hash:?} dropped")))?;

        Ok(FlipReceipt {
            tx_hash,
            block_number: receipt.block_number.map(|n| n.as_u64()),
            success: receipt.status == Some(U64::from(1)),
        })
    }
}

impl std::fmt::Debug for LocalKeyWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalKeyWallet")
            .field("address", &format_address(&self.wallet.address()))
            .finish()
    }
}
