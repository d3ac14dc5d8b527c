mod cli;
mod client;
mod error;
mod monitor;
mod output;
mod popup;

use std::io;

use clap::Parser;
use cli::{Command, DiscordCommand};
use gorillas::{Gorillas, ReferralDecision};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::client::{connect_wallet, create_client, require_login};
use crate::error::CliError;
use crate::output::{emit, Fact, QuestBoard};

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Initialize tracing
    let filter = cli
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_max_level(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let _ = dotenvy::dotenv(); // load .env if present

    let cancel = setup_signal_handlers();

    if let Err(e) = run(cli.command, cli.json, cancel).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(command: Command, json: bool, cancel: CancellationToken) -> Result<(), CliError> {
    let gorillas = create_client()?;
    let mut out = io::stdout();

    match command {
        Command::Login => {
            let connection = connect_wallet(&gorillas).await?;
            info!(address = %connection.address_string(), "signing login challenge");
            gorillas.connect_and_login(&cancel).await?;
            report_referral(&gorillas).await;
            let facts = [
                Fact {
                    key: "address",
                    value: connection.address_string(),
                },
                Fact {
                    key: "logged_in",
                    value: gorillas.is_logged_in().to_string(),
                },
            ];
            emit(&mut out, &facts[..], json)?;
        }

        Command::Logout => {
            gorillas.logout().await?;
        }

        Command::Whoami => {
            let connection = connect_wallet(&gorillas).await.ok();
            let facts = [
                Fact {
                    key: "address",
                    value: connection
                        .map(|c| c.address_string())
                        .unwrap_or_else(|| "-".into()),
                },
                Fact {
                    key: "logged_in",
                    value: gorillas.is_logged_in().to_string(),
                },
                Fact {
                    key: "chain",
                    value: format!("{:?}", gorillas.chain_status()),
                },
                Fact {
                    key: "pending_referral",
                    value: gorillas
                        .pending_referral()
                        .get()
                        .unwrap_or_else(|| "-".into()),
                },
            ];
            emit(&mut out, &facts[..], json)?;
        }

        Command::Stats(args) if args.global => {
            if let Some(stats) = gorillas.global_stats().await? {
                emit(&mut out, stats.as_ref(), json)?;
            }
        }

        Command::Stats(_) => {
            require_login(&gorillas)?;
            if let Some(stats) = gorillas.user_stats().await? {
                emit(&mut out, stats.as_ref(), json)?;
            }
        }

        Command::History(args) => {
            let history = if args.global {
                gorillas.global_flip_history().await?
            } else {
                require_login(&gorillas)?;
                gorillas.flip_history().await?
            };
            if let Some(history) = history {
                emit(&mut out, history.as_ref(), json)?;
            }
        }

        Command::FlipsLeft => {
            require_login(&gorillas)?;
            if let Some(count) = gorillas.flip_count().await? {
                emit(&mut out, count.as_ref(), json)?;
            }
        }

        Command::Achievements => {
            require_login(&gorillas)?;
            if let Some(achievements) = gorillas.achievements().await? {
                emit(&mut out, achievements.as_ref(), json)?;
            }
        }

        Command::Quests => {
            require_login(&gorillas)?;
            let connection = connect_wallet(&gorillas).await?;
            let address = gorillas::wallet::format_address(&connection.address);
            if let Some(quests) = gorillas.quests(&address).await? {
                let claimed = gorillas.locally_claimed(&address)?;
                let board = QuestBoard {
                    quests: &quests,
                    locally_claimed: &claimed,
                };
                emit(&mut out, &board, json)?;
            }
        }

        Command::Referral => {
            require_login(&gorillas)?;
            if let Some(info) = gorillas.referral_info().await? {
                emit(&mut out, info.as_ref(), json)?;
            }
        }

        Command::Leaderboard => {
            if let Some(board) = gorillas.leaderboard().await? {
                emit(&mut out, board.as_ref(), json)?;
            }
        }

        Command::ClaimAchievement(args) => {
            require_login(&gorillas)?;
            let response = gorillas.claim_achievement(&args.id).await?;
            emit(&mut out, &claim_facts(&response)[..], json)?;
        }

        Command::ClaimTask(args) => {
            require_login(&gorillas)?;
            connect_wallet(&gorillas).await?;
            let response = gorillas.claim_task(&args.id).await?;
            emit(&mut out, &claim_facts(&response)[..], json)?;
        }

        Command::Refer(args) => {
            let submission = gorillas.submit_referral(&args.code).await?;
            let facts = [Fact {
                key: "success",
                value: submission.success.to_string(),
            }];
            emit(&mut out, &facts[..], json)?;
        }

        Command::CaptureReferral(args) => {
            let url = Url::parse(&args.url)?;
            match gorillas.pending_referral().capture_from_url(&url)? {
                Some(code) => {
                    info!(%code, "referral code saved");
                    report_referral(&gorillas).await;
                }
                None => warn!("URL has no referral code"),
            }
        }

        Command::Flip(args) => {
            require_login(&gorillas)?;
            connect_wallet(&gorillas).await?;
            let receipt = tokio::select! {
                _ = cancel.cancelled() => return Err(gorillas::GorillasError::Cancelled.into()),
                receipt = gorillas.flip_coin(args.guess.as_guess()) => receipt?,
            };
            let facts = [
                Fact {
                    key: "tx_hash",
                    value: format!("{:#x}", receipt.tx_hash),
                },
                Fact {
                    key: "block",
                    value: receipt
                        .block_number
                        .map(|b| b.to_string())
                        .unwrap_or_else(|| "-".into()),
                },
                Fact {
                    key: "success",
                    value: receipt.success.to_string(),
                },
            ];
            emit(&mut out, &facts[..], json)?;
        }

        Command::Discord(DiscordCommand::Status) => {
            require_login(&gorillas)?;
            if let Some(status) = gorillas.discord_status(true).await? {
                emit(&mut out, status.as_ref(), json)?;
            }
        }

        Command::Discord(DiscordCommand::Verify) => {
            require_login(&gorillas)?;
            let status = gorillas
                .verify_discord(&popup::TerminalPopupOpener, &cancel)
                .await?;
            emit(&mut out, &status, json)?;
            report_referral(&gorillas).await;
        }

        Command::Discord(DiscordCommand::Unlink) => {
            require_login(&gorillas)?;
            gorillas.unlink_discord().await?;
        }

        Command::Monitor => {
            monitor::run_monitor(&gorillas, json, cancel).await?;
        }
    }

    Ok(())
}

fn claim_facts(response: &gorillas::ClaimResponse) -> [Fact<'static>; 3] {
    [
        Fact {
            key: "success",
            value: response.success.to_string(),
        },
        Fact {
            key: "points",
            value: response
                .points
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".into()),
        },
        Fact {
            key: "message",
            value: response.message.clone().unwrap_or_default(),
        },
    ]
}

/// Try to act on a pending referral code and log what happened.
async fn report_referral(gorillas: &Gorillas) {
    match gorillas.process_pending_referral().await {
        Ok(ReferralDecision::Nothing) => {}
        Ok(ReferralDecision::Submit(code)) => info!(%code, "pending referral submitted"),
        Ok(ReferralDecision::AwaitLogin(code)) => {
            info!(%code, "referral code will be submitted after login")
        }
        Ok(ReferralDecision::RequireDiscord(code)) => {
            warn!(%code, "verify Discord (`gorillas discord verify`) to submit the referral code")
        }
        Err(e) => warn!(error = %e, "pending referral not submitted"),
    }
}

/// Register SIGINT and SIGTERM handlers that trigger the returned token.
fn setup_signal_handlers() -> CancellationToken {
    let cancel = CancellationToken::new();

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received SIGINT, shutting down");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("received SIGTERM, shutting down");
                    cancel_clone.cancel();
                }
                Err(e) => warn!(error = %e, "failed to register SIGTERM handler"),
            }
        });
    }

    cancel
}
