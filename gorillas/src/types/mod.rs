mod achievement;
mod auth;
mod discord;
mod flip;
mod leaderboard;
mod polling;
mod quest;
mod referral;
mod stats;

pub use achievement::*;
pub use auth::*;
pub use discord::*;
pub use flip::*;
pub use leaderboard::*;
pub use polling::*;
pub use quest::*;
pub use referral::*;
pub use stats::*;
