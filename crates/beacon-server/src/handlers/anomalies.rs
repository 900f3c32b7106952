//! Anomaly detection handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::require_user;
use crate::{AppError, AppState};
use beacon_core::detect::{AnomalyDetector, DetectionResult};
use beacon_core::DispatchOutcome;

/// Query parameters for anomaly detection
#[derive(Debug, Default, Deserialize)]
pub struct AnomalyQuery {
    /// Window start (YYYY-MM-DD), defaults to one month before `end`
    pub start: Option<String>,
    /// Window end (YYYY-MM-DD, inclusive), defaults to now
    pub end: Option<String>,
    /// z-score threshold, defaults to the configured one
    pub threshold: Option<f64>,
    /// Minimum anomaly score worth an alert (alerts endpoint only)
    pub min_score: Option<f64>,
}

/// Response for the anomaly alerts endpoint
#[derive(Serialize)]
pub struct AnomalyAlertsResponse {
    pub anomalies_found: usize,
    pub outcomes: Vec<DispatchOutcome>,
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request(&format!("Invalid {} date format (use YYYY-MM-DD)", field)))
}

/// Resolve the detection window from query parameters
fn resolve_window(
    params: &AnomalyQuery,
    now: DateTime<Utc>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let end = match params.end.as_deref() {
        Some(s) => parse_date(s, "end")?
            .and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
            .and_utc(),
        None => now,
    };
    let start = match params.start.as_deref() {
        Some(s) => parse_date(s, "start")?.and_time(NaiveTime::MIN).and_utc(),
        None => end
            .checked_sub_months(Months::new(1))
            .unwrap_or(end - chrono::Duration::days(30)),
    };

    if start > end {
        return Err(AppError::bad_request("start must not be after end"));
    }
    Ok((start, end))
}

fn run_detection(
    state: &AppState,
    user_id: i64,
    params: &AnomalyQuery,
) -> Result<DetectionResult, AppError> {
    let (start, end) = resolve_window(params, Utc::now())?;
    let detector = AnomalyDetector::with_config(state.db.as_ref(), state.alerts.detection.clone());
    let result = detector.detect(user_id, start, end, params.threshold.unwrap_or(0.0))?;

    state.db.record_anomaly_analysis(&result)?;
    Ok(result)
}

/// GET /api/users/:user_id/anomalies - Detect anomalies in a window
pub async fn get_anomalies(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<AnomalyQuery>,
) -> Result<Json<DetectionResult>, AppError> {
    require_user(&state, user_id)?;
    let result = run_detection(&state, user_id, &params)?;
    Ok(Json(result))
}

/// POST /api/users/:user_id/anomalies/alerts - Detect and alert on the strongest anomalies
pub async fn send_anomaly_alerts(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<AnomalyQuery>,
) -> Result<Json<AnomalyAlertsResponse>, AppError> {
    require_user(&state, user_id)?;
    let result = run_detection(&state, user_id, &params)?;

    let min_score = params
        .min_score
        .unwrap_or(state.alerts.anomaly_policy.min_score);
    let outcomes =
        state
            .dispatcher
            .dispatch_anomalies(user_id, &result.anomalies, min_score, Utc::now())?;

    info!(
        user_id,
        found = result.anomalies.len(),
        sent = outcomes.iter().filter(|o| !o.is_suppressed()).count(),
        "Anomaly alerts dispatched"
    );

    Ok(Json(AnomalyAlertsResponse {
        anomalies_found: result.anomalies.len(),
        outcomes,
    }))
}
