//! Alert sweep handler

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use tracing::info;

use crate::{AppError, AppState};
use beacon_core::SweepReport;

/// POST /api/sweep - Run one sweep over every user and wait for it
pub async fn run_sweep(State(state): State<Arc<AppState>>) -> Result<Json<SweepReport>, AppError> {
    let sweeper = state.sweeper.clone();
    let report = tokio::task::spawn_blocking(move || sweeper.run_once(Utc::now()))
        .await
        .map_err(|_| AppError::internal("Sweep task failed"))??;

    info!(
        users = report.users_processed,
        failed = report.users_failed,
        sent = report.alerts_sent,
        "Manual sweep completed"
    );

    Ok(Json(report))
}
