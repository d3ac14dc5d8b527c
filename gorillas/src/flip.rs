//! Coin-flip wager and the cache invalidation that follows its confirmation.

use tracing::info;

use crate::cache::FLIP_AFFECTED;
use crate::client::Gorillas;
use crate::error::{GorillasError, Result};
use crate::wallet::FlipReceipt;

/// Confirmations awaited before a flip counts as settled.
pub const FLIP_CONFIRMATIONS: usize = 1;

impl Gorillas {
    /// Wager on `guess` (true = heads) and wait for the receipt.
    ///
    /// The connected chain is checked but a mismatch is only logged. Once the
    /// transaction is confirmed every read a flip can change is invalidated.
    pub async fn flip_coin(&self, guess: bool) -> Result<FlipReceipt> {
        let connection = self.require_connection()?;
        self.chain_guard.observe(Some(&connection));
        let contract = self
            .config
            .contract_address
            .ok_or_else(|| GorillasError::Config("no contract address configured".into()))?;

        let connector = self.wallet.connector();
        let tx_hash = connector
            .send_flip(contract, guess, self.config.flip_fee_wei)
            .await?;
        info!(?tx_hash, guess, "flip submitted");

        let receipt = connector
            .wait_for_receipt(tx_hash, FLIP_CONFIRMATIONS)
            .await?;
        self.on_flip_confirmed(&receipt);
        Ok(receipt)
    }

    /// A flip transaction reached confirmation.
    pub fn on_flip_confirmed(&self, receipt: &FlipReceipt) {
        info!(
            tx_hash = ?receipt.tx_hash,
            block = ?receipt.block_number,
            success = receipt.success,
            "flip confirmed"
        );
        self.cache.invalidate(FLIP_AFFECTED);
    }
}
