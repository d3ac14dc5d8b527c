use clap::{Args, Parser, Subcommand, ValueEnum};

/// gorillas: command-line client for the Some Gorillas coin-flip game.
#[derive(Parser, Debug)]
#[command(name = "gorillas", version)]
pub struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    /// Output as JSON instead of TSV
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect the wallet from PRIVATE_KEY and log in
    Login,

    /// Clear the stored session
    Logout,

    /// Show the wallet, session and chain status
    Whoami,

    /// Player stats (or game-wide totals with --global)
    Stats(ScopeArgs),

    /// Flip history (or everyone's recent flips with --global)
    History(ScopeArgs),

    /// Flips left today
    FlipsLeft,

    /// Achievements of the logged-in player
    Achievements,

    /// Quests of the connected wallet
    Quests,

    /// Referral code and referral count
    Referral,

    /// Leaderboard
    Leaderboard,

    /// Claim an unlocked achievement
    ClaimAchievement(IdArgs),

    /// Claim a completed quest
    ClaimTask(IdArgs),

    /// Submit a referral code
    Refer(ReferArgs),

    /// Remember the `ref` code of a landing URL until it can be submitted
    CaptureReferral(CaptureArgs),

    /// Wager on a coin flip
    Flip(FlipArgs),

    /// Discord verification
    #[command(subcommand)]
    Discord(DiscordCommand),

    /// Watch the health of the backend's chain listener
    Monitor,
}

#[derive(Subcommand, Debug)]
pub enum DiscordCommand {
    /// Show the Discord link status
    Status,
    /// Link a Discord account through the OAuth page
    Verify,
    /// Unlink the Discord account (ends the session)
    Unlink,
}

#[derive(Args, Debug)]
pub struct ScopeArgs {
    /// Game-wide instead of personal
    #[arg(long)]
    pub global: bool,
}

#[derive(Args, Debug)]
pub struct IdArgs {
    pub id: String,
}

#[derive(Args, Debug)]
pub struct ReferArgs {
    pub code: String,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// URL carrying a `ref` query parameter
    pub url: String,
}

#[derive(Args, Debug)]
pub struct FlipArgs {
    pub guess: Side,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Heads,
    Tails,
}

impl Side {
    pub fn as_guess(self) -> bool {
        matches!(self, Self::Heads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flip() {
        let cli = Cli::parse_from(["gorillas", "--json", "flip", "heads"]);
        assert!(cli.json);
        match cli.command {
            Command::Flip(args) => assert!(args.guess.as_guess()),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_discord_subcommand() {
        let cli = Cli::parse_from(["gorillas", "discord", "verify", "--log-level", "debug"]);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Command::Discord(DiscordCommand::Verify)));
    }

    #[test]
    fn test_parse_stats_global() {
        let cli = Cli::parse_from(["gorillas", "stats", "--global"]);
        assert!(matches!(cli.command, Command::Stats(ScopeArgs { global: true })));
    }
}
