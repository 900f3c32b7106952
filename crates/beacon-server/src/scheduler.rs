//! Background alert sweep scheduler
//!
//! Optional periodic sweep over every user, enabled via environment:
//!
//! - `BEACON_ALERT_SCHEDULE`: Interval in hours (e.g., "6"). Unset or 0 disables.
//!
//! Each tick runs anomaly, budget and goal checks through the dispatcher.
//! The task stops when the shutdown channel flips to true; a sweep already
//! in progress stops before its next user.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{error, info, warn};

use beacon_core::AlertSweeper;

/// Environment variable holding the sweep interval in hours
pub const ALERT_SCHEDULE_ENV: &str = "BEACON_ALERT_SCHEDULE";

/// Configuration for scheduled sweeps
#[derive(Debug, Clone)]
pub struct AlertScheduleConfig {
    /// Interval between sweeps in hours
    pub interval_hours: u64,
}

impl AlertScheduleConfig {
    /// Parse configuration from environment variables
    ///
    /// Returns None if scheduling is not configured
    pub fn from_env() -> Option<Self> {
        Self::from_value(std::env::var(ALERT_SCHEDULE_ENV).ok().as_deref())
    }

    fn from_value(value: Option<&str>) -> Option<Self> {
        let interval_hours: u64 = value.and_then(|s| s.trim().parse().ok())?;

        if interval_hours == 0 {
            warn!("{} is 0, scheduled sweeps disabled", ALERT_SCHEDULE_ENV);
            return None;
        }

        Some(Self { interval_hours })
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }
}

/// Start the sweep scheduler as a background task
pub fn start_alert_scheduler(
    sweeper: Arc<AlertSweeper>,
    config: AlertScheduleConfig,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    info!(
        "Starting alert scheduler: every {} hours",
        config.interval_hours
    );
    tokio::spawn(run_schedule(sweeper, config.period(), shutdown))
}

async fn run_schedule(
    sweeper: Arc<AlertSweeper>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);

    // Skip the first immediate tick - no sweep on startup
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Alert scheduler stopping");
                    return;
                }
                continue;
            }
        }

        info!("Running scheduled alert sweep...");

        let sweeper = sweeper.clone();
        let signal = shutdown.clone();
        let result =
            tokio::task::spawn_blocking(move || sweeper.run_with_shutdown(Utc::now(), &signal))
                .await;

        match result {
            Ok(Ok(report)) => {
                info!(
                    users = report.users_processed,
                    failed = report.users_failed,
                    sent = report.alerts_sent,
                    suppressed = report.alerts_suppressed,
                    interrupted = report.interrupted,
                    "Scheduled sweep completed"
                );
                if report.interrupted {
                    return;
                }
            }
            Ok(Err(e)) => error!("Scheduled sweep failed: {}", e),
            Err(e) => error!("Scheduled sweep task panicked: {}", e),
        }
    }
}
