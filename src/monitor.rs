//! `monitor`: prints a line whenever the chain listener's health changes.

use std::io;

use chrono::Local;
use gorillas::Gorillas;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::CliError;
use crate::output::{emit, HealthLine};

pub async fn run_monitor(
    gorillas: &Gorillas,
    json: bool,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    let monitor = gorillas.polling_monitor();
    let mut health_rx = monitor.subscribe();
    let mut stdout = io::stdout();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            changed = health_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let health = health_rx.borrow_and_update().clone();
                let line = HealthLine::new(Local::now().format("%H:%M:%S").to_string(), &health);
                emit(&mut stdout, &line, json)?;
            }
        }
    }

    monitor.close();
    info!("monitor stopped");
    Ok(())
}
