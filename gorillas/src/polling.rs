//! Health of the backend's chain event listener, from `GET /polling/status`.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::Gorillas;
use crate::error::Result;
use crate::rest::GorillasHttpClient;
use crate::types::PollingStatus;

pub const POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(1);
/// A listener whose last poll is older than this is reported stale.
pub const STALE_THRESHOLD: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollingHealth {
    /// No status received yet.
    Unknown,
    Healthy { last_block: Option<u64> },
    /// Running but not polling recently. `age` is `None` if it never polled.
    Stale { age: Option<Duration> },
    Stopped,
    /// The listener reported an error.
    Errored(String),
    /// The status endpoint itself could not be reached.
    Unreachable(String),
}

impl PollingHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }
}

/// Classify `status` as of `now`.
pub fn assess(status: &PollingStatus, now: DateTime<Utc>) -> PollingHealth {
    if let Some(error) = &status.error {
        return PollingHealth::Errored(error.clone());
    }
    if !status.is_running {
        return PollingHealth::Stopped;
    }
    let Some(last_poll) = status.last_poll_time else {
        return PollingHealth::Stale { age: None };
    };
    let age = (now - last_poll).to_std().unwrap_or(Duration::ZERO);
    if age > STALE_THRESHOLD {
        return PollingHealth::Stale { age: Some(age) };
    }
    PollingHealth::Healthy {
        last_block: status.last_block,
    }
}

/// Fetch the status, retrying retryable failures up to `retries` times.
pub async fn fetch_with_retry(
    http: &GorillasHttpClient,
    retries: u32,
    delay: Duration,
) -> Result<PollingStatus> {
    let mut attempt = 0;
    loop {
        match http.get_polling_status().await {
            Ok(status) => return Ok(status),
            Err(e) if attempt < retries && e.is_retryable() => {
                attempt += 1;
                debug!(attempt, error = %e, "polling status failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Background task publishing [`PollingHealth`] every [`POLL_INTERVAL`].
pub struct PollingMonitor {
    health_rx: watch::Receiver<PollingHealth>,
    cancel: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl PollingMonitor {
    /// Start polling immediately.
    pub fn start(http: GorillasHttpClient, interval: Duration) -> Self {
        let (health_tx, health_rx) = watch::channel(PollingHealth::Unknown);
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            run_monitor(http, interval, health_tx, task_cancel).await;
        });

        Self {
            health_rx,
            cancel,
            task_handle: Some(handle),
        }
    }

    pub fn health(&self) -> PollingHealth {
        self.health_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollingHealth> {
        self.health_rx.clone()
    }

    /// Stop the background task.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for PollingMonitor {
    fn drop(&mut self) {
        self.close();
        if let Some(h) = self.task_handle.take() {
            h.abort();
        }
    }
}

async fn run_monitor(
    http: GorillasHttpClient,
    interval: Duration,
    health_tx: watch::Sender<PollingHealth>,
    cancel: CancellationToken,
) {
    info!(interval_secs = interval.as_secs(), "polling monitor active");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let health = match fetch_with_retry(&http, MAX_RETRIES, RETRY_DELAY).await {
                    Ok(status) => assess(&status, Utc::now()),
                    Err(e) => PollingHealth::Unreachable(e.to_string()),
                };
                if !health.is_healthy() {
                    warn!(?health, "event listener unhealthy");
                }
                health_tx.send_replace(health);
            }
        }
    }
    info!("polling monitor stopped");
}

impl Gorillas {
    /// One-shot health check of the event listener.
    pub async fn polling_health(&self) -> PollingHealth {
        match fetch_with_retry(&self.http, MAX_RETRIES, RETRY_DELAY).await {
            Ok(status) => assess(&status, Utc::now()),
            Err(e) => PollingHealth::Unreachable(e.to_string()),
        }
    }

    pub fn polling_monitor(&self) -> PollingMonitor {
        PollingMonitor::start(self.http.clone(), POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn status(age_secs: Option<i64>) -> PollingStatus {
        PollingStatus {
            is_running: true,
            last_poll_time: age_secs.map(|s| now() - chrono::Duration::seconds(s)),
            last_block: Some(42),
            error: None,
        }
    }

    #[test]
    fn test_assess_healthy() {
        assert_eq!(
            assess(&status(Some(10)), now()),
            PollingHealth::Healthy {
                last_block: Some(42)
            }
        );
    }

    #[test]
    fn test_assess_stale_after_threshold() {
        assert_eq!(
            assess(&status(Some(26)), now()),
            PollingHealth::Stale {
                age: Some(Duration::from_secs(26))
            }
        );
        assert_eq!(assess(&status(None), now()), PollingHealth::Stale { age: None });
    }

    #[test]
    fn test_assess_error_and_stopped() {
        let mut s = status(Some(1));
        s.error = Some("rpc down".into());
        assert_eq!(assess(&s, now()), PollingHealth::Errored("rpc down".into()));

        let mut s = status(Some(1));
        s.is_running = false;
        assert_eq!(assess(&s, now()), PollingHealth::Stopped);
    }
}
