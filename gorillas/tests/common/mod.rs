//! Shared fixtures: a scriptable wallet and a client pointed at a mock server.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ethers::types::{Address, TxHash, U256};
use gorillas::wallet::parse_address;
use gorillas::{
    FlipReceipt, Gorillas, GorillasConfig, GorillasError, MemoryStorage, Result, Storage,
    WalletConnection, WalletConnector,
};

pub const ADDRESS: &str = "0xabc0000000000000000000000000000000000001";
pub const OTHER_ADDRESS: &str = "0xdef0000000000000000000000000000000000002";
pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const SIGNATURE: &str = "0xfeedface";
pub const CHAIN_ID: u64 = 31337;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignBehavior {
    Sign,
    Reject,
    /// Never answers, like a wallet prompt left open.
    Hang,
}

/// In-memory wallet that records what it was asked to do.
pub struct FakeWallet {
    pub address: Address,
    pub chain_id: u64,
    behavior: Mutex<SignBehavior>,
    signed: Mutex<Vec<String>>,
    flips: Mutex<Vec<bool>>,
    disconnects: AtomicUsize,
}

impl FakeWallet {
    pub fn new(behavior: SignBehavior) -> Arc<Self> {
        Arc::new(Self {
            address: parse_address(ADDRESS).unwrap(),
            chain_id: CHAIN_ID,
            behavior: Mutex::new(behavior),
            signed: Mutex::new(Vec::new()),
            flips: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn set_behavior(&self, behavior: SignBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn signed_messages(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }

    pub fn flips(&self) -> Vec<bool> {
        self.flips.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletConnector for FakeWallet {
    async fn connect(&self) -> Result<WalletConnection> {
        Ok(WalletConnection {
            address: self.address,
            chain_id: self.chain_id,
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn sign_message(&self, _address: Address, message: &str) -> Result<String> {
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            SignBehavior::Sign => {
                self.signed.lock().unwrap().push(message.to_string());
                Ok(SIGNATURE.to_string())
            }
            SignBehavior::Reject => Err(GorillasError::UserRejected),
            SignBehavior::Hang => std::future::pending().await,
        }
    }

    async fn send_flip(&self, _contract: Address, guess: bool, _fee: U256) -> Result<TxHash> {
        self.flips.lock().unwrap().push(guess);
        Ok(TxHash::repeat_byte(0x11))
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        _confirmations: usize,
    ) -> Result<FlipReceipt> {
        Ok(FlipReceipt {
            tx_hash,
            block_number: Some(7),
            success: true,
        })
    }
}

pub fn config(api_url: &str) -> GorillasConfig {
    GorillasConfig {
        api_url: api_url.to_string(),
        chain_id: CHAIN_ID,
        contract_address: Some(parse_address(CONTRACT).unwrap()),
        ..GorillasConfig::default()
    }
}

pub struct Harness {
    pub gorillas: Gorillas,
    pub wallet: Arc<FakeWallet>,
    pub storage: Arc<MemoryStorage>,
}

pub fn harness(api_url: &str) -> Harness {
    harness_with(config(api_url), Arc::new(MemoryStorage::new()), SignBehavior::Sign)
}

pub fn harness_with(
    config: GorillasConfig,
    storage: Arc<MemoryStorage>,
    behavior: SignBehavior,
) -> Harness {
    let wallet = FakeWallet::new(behavior);
    let gorillas = Gorillas::new(
        config,
        storage.clone() as Arc<dyn Storage>,
        wallet.clone() as Arc<dyn WalletConnector>,
    )
    .unwrap();
    Harness {
        gorillas,
        wallet,
        storage,
    }
}

/// A harness that is already connected and holds `token`.
pub async fn logged_in(api_url: &str, token: &str) -> Harness {
    let h = harness(api_url);
    h.gorillas.wallet().connect().await.unwrap();
    h.gorillas.tokens().set(token).unwrap();
    h
}
