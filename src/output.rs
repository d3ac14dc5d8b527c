//! Result rendering: TSV by default, JSON with `--json`.

use std::collections::BTreeSet;
use std::io::Write;

use gorillas::{
    Achievement, DiscordStatus, FlipCount, FlipRecord, GlobalStats, LeaderboardEntry,
    PollingHealth, Quest, ReferralInfo, UserStats,
};
use serde::Serialize;

use crate::error::CliError;

/// Row-oriented view of a result for TSV output.
pub trait Tabular {
    fn rows(&self) -> Vec<Vec<String>>;
}

/// Write `value` as one JSON document or as TSV lines.
pub fn emit<W, T>(writer: &mut W, value: &T, json: bool) -> Result<(), CliError>
where
    W: Write,
    T: Serialize + Tabular + ?Sized,
{
    if json {
        serde_json::to_writer(&mut *writer, value)?;
        writer.write_all(b"\n")?;
    } else {
        for row in value.rows() {
            writer.write_all(row.join("\t").as_bytes())?;
            writer.write_all(b"\n")?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn kv(key: &str, value: impl ToString) -> Vec<String> {
    vec![key.to_string(), value.to_string()]
}

impl Tabular for UserStats {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![
            kv("address", &self.address),
            kv("flips", self.total_flips),
            kv("wins", self.wins),
            kv("losses", self.losses),
            kv("win_rate", format!("{:.1}%", self.win_rate() * 100.0)),
            kv("streak", self.current_streak),
            kv("best_streak", self.best_streak),
            kv("points", self.points),
            kv("wagered_wei", &self.total_wagered),
        ]
    }
}

impl Tabular for GlobalStats {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![
            kv("flips", self.total_flips),
            kv("players", self.total_players),
            kv("wagered_wei", &self.total_wagered),
            kv("heads", self.heads_count),
            kv("tails", self.tails_count),
        ]
    }
}

impl Tabular for Vec<FlipRecord> {
    fn rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|f| {
                vec![
                    f.created_at.clone().unwrap_or_default(),
                    f.address.clone(),
                    side(f.guess).into(),
                    side(f.result).into(),
                    if f.won { "won" } else { "lost" }.into(),
                    f.tx_hash.clone(),
                ]
            })
            .collect()
    }
}

fn side(heads: bool) -> &'static str {
    if heads {
        "heads"
    } else {
        "tails"
    }
}

impl Tabular for FlipCount {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![
            kv("remaining", self.remaining),
            kv("used", self.used),
            kv("daily_limit", self.daily_limit),
        ]
    }
}

impl Tabular for Vec<Achievement> {
    fn rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|a| {
                let state = if a.claimed {
                    "claimed"
                } else if a.is_claimable() {
                    "claimable"
                } else {
                    "locked"
                };
                vec![a.id.clone(), a.name.clone(), a.points.to_string(), state.into()]
            })
            .collect()
    }
}

/// Quests with the local claimed overlay applied.
#[derive(Debug, Serialize)]
pub struct QuestBoard<'a> {
    pub quests: &'a [Quest],
    pub locally_claimed: &'a BTreeSet<String>,
}

impl Tabular for QuestBoard<'_> {
    fn rows(&self) -> Vec<Vec<String>> {
        self.quests
            .iter()
            .map(|q| {
                let state = if q.is_claimed(self.locally_claimed) {
                    "claimed"
                } else if q.is_claimable(self.locally_claimed) {
                    "claimable"
                } else {
                    "in-progress"
                };
                vec![
                    q.id.clone(),
                    q.title.clone(),
                    format!("{}/{}", q.progress, q.target),
                    q.reward.to_string(),
                    state.into(),
                ]
            })
            .collect()
    }
}

impl Tabular for ReferralInfo {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![
            kv("code", &self.referral_code),
            kv("referred_by", self.referred_by.as_deref().unwrap_or("-")),
            kv("referrals", self.referral_count),
            kv("points", self.points_earned),
        ]
    }
}

impl Tabular for Vec<LeaderboardEntry> {
    fn rows(&self) -> Vec<Vec<String>> {
        self.iter()
            .map(|e| {
                vec![
                    e.rank.to_string(),
                    e.address.clone(),
                    e.points.to_string(),
                    e.total_flips.to_string(),
                    e.wins.to_string(),
                ]
            })
            .collect()
    }
}

impl Tabular for DiscordStatus {
    fn rows(&self) -> Vec<Vec<String>> {
        let mut rows = vec![kv("verified", self.verified)];
        if let Some(user) = &self.discord_user {
            rows.push(kv("discord_user", &user.username));
            rows.push(kv("discord_id", &user.id));
        }
        rows
    }
}

/// A single `key value` fact.
#[derive(Debug, Serialize)]
pub struct Fact<'a> {
    pub key: &'a str,
    pub value: String,
}

impl Tabular for [Fact<'_>] {
    fn rows(&self) -> Vec<Vec<String>> {
        self.iter().map(|f| kv(f.key, &f.value)).collect()
    }
}

/// One line of `monitor` output.
#[derive(Debug, Serialize)]
pub struct HealthLine {
    pub time: String,
    pub health: &'static str,
    pub detail: String,
}

impl HealthLine {
    pub fn new(time: String, health: &PollingHealth) -> Self {
        let (label, detail) = match health {
            PollingHealth::Unknown => ("unknown", String::new()),
            PollingHealth::Healthy { last_block } => (
                "healthy",
                last_block.map(|b| format!("block {b}")).unwrap_or_default(),
            ),
            PollingHealth::Stale { age: Some(age) } => {
                ("stale", format!("{}s since last poll", age.as_secs()))
            }
            PollingHealth::Stale { age: None } => ("stale", "never polled".into()),
            PollingHealth::Stopped => ("stopped", String::new()),
            PollingHealth::Errored(e) => ("error", e.clone()),
            PollingHealth::Unreachable(e) => ("unreachable", e.clone()),
        };
        Self {
            time,
            health: label,
            detail,
        }
    }
}

impl Tabular for HealthLine {
    fn rows(&self) -> Vec<Vec<String>> {
        vec![vec![self.time.clone(), self.health.into(), self.detail.clone()]]
    }
}
