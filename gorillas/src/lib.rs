pub mod cache;
pub mod chain;
pub mod claimed;
pub mod client;
pub mod config;
pub mod discord;
pub mod error;
pub mod flip;
pub mod mutations;
pub mod polling;
pub mod queries;
pub mod referral;
pub mod rest;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;
pub mod wallet;

// ---- Top-level re-exports for ergonomic usage ----

// Client + config + errors
pub use client::{Gorillas, Route};
pub use config::GorillasConfig;
pub use error::{GorillasError, Result};

// Session
pub use session::{login_message, LoginState, SessionBootstrapper, LOGIN_MESSAGE_PREFIX};
pub use token::TokenStore;

// Storage
pub use storage::{FileStorage, MemoryStorage, Storage};

// Cache
pub use cache::{CacheEvent, QueryCache, QueryKey, QueryKind, FLIP_AFFECTED};

// REST client
pub use rest::GorillasHttpClient;

// Wallet + chain
pub use chain::{ChainGuard, ChainStatus};
pub use wallet::{
    FlipReceipt, LocalKeyWallet, ReadOnlyWallet, WalletAdapter, WalletConnection, WalletConnector,
};

// Discord
pub use discord::{
    DiscordAuthMessage, FlowState, OpenedPopup, OpenerChannel, PopupOpener, PopupWindow,
    PromptPolicy, WindowMessage,
};

// Local overlays
pub use claimed::ClaimedTasks;
pub use referral::{PendingReferral, ReferralDecision};

// Listener health
pub use polling::{PollingHealth, PollingMonitor};

// Backend payloads
pub use types::{
    Achievement, ClaimResponse, DiscordStatus, DiscordUser, FlipCount, FlipRecord, GlobalStats,
    LeaderboardEntry, PollingStatus, Quest, ReferralInfo, ReferralSubmission, UserStats,
};
