//! Network check for the connected wallet. Observational only: a mismatch is
//! reported and logged, never enforced.

use tracing::warn;

use crate::wallet::WalletConnection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Correct,
    WrongChain { connected: u64, required: u64 },
    Disconnected,
}

#[derive(Debug, Clone, Copy)]
pub struct ChainGuard {
    required_chain_id: u64,
}

impl ChainGuard {
    pub fn new(required_chain_id: u64) -> Self {
        Self { required_chain_id }
    }

    pub fn required_chain_id(&self) -> u64 {
        self.required_chain_id
    }

    pub fn status(&self, connection: Option<&WalletConnection>) -> ChainStatus {
        match connection {
            None => ChainStatus::Disconnected,
            Some(c) if c.chain_id == self.required_chain_id => ChainStatus::Correct,
            Some(c) => ChainStatus::WrongChain {
                connected: c.chain_id,
                required: self.required_chain_id,
            },
        }
    }

    pub fn is_on_correct_chain(&self, connection: Option<&WalletConnection>) -> bool {
        self.status(connection) == ChainStatus::Correct
    }

    /// Like [`ChainGuard::status`], logging a warning on mismatch.
    pub fn observe(&self, connection: Option<&WalletConnection>) -> ChainStatus {
        let status = self.status(connection);
        if let ChainStatus::WrongChain { connected, required } = status {
            warn!(connected, required, "wallet is on the wrong chain");
        }
        status
    }
}
