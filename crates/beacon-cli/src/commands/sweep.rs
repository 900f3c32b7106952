//! One-off alert sweep command

use anyhow::{Context, Result};
use beacon_core::db::Database;
use beacon_core::{AlertConfig, SweepReport};
use beacon_server::AppState;
use chrono::Utc;
use tracing::debug;

/// Run every alert check once and wait for deliveries to finish
pub async fn cmd_sweep(db: Database, config: AlertConfig) -> Result<SweepReport> {
    println!("🔄 Running alert sweep...");

    let state = AppState::new(db, config);
    let sweeper = state.sweeper.clone();
    let report = tokio::task::spawn_blocking(move || sweeper.run_once(Utc::now()))
        .await
        .context("Sweep task failed")?
        .context("Sweep failed")?;

    // Let queued channel deliveries drain before exiting
    state.dispatcher.fanout().shutdown().await;
    let stats = state.dispatcher.fanout().stats();
    debug!(?report, ?stats, "Sweep finished");

    println!("   Users: {} processed, {} failed", report.users_processed, report.users_failed);
    println!("   Anomalies found: {}", report.anomalies_found);
    println!(
        "   Alerts: {} sent, {} suppressed",
        report.alerts_sent, report.alerts_suppressed
    );
    println!(
        "   Deliveries: {} delivered, {} failed, {} timed out, {} dropped",
        stats.delivered, stats.failed, stats.timed_out, stats.dropped
    );
    if report.users_failed > 0 {
        println!("⚠️  Some users failed; see log output for details");
    } else {
        println!("✅ Sweep complete");
    }

    Ok(report)
}
