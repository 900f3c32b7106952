//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use beacon_core::models::Channel;
use beacon_core::DeliveryStatsSnapshot;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub channels: Vec<Channel>,
    pub delivery: DeliveryStatsSnapshot,
}

/// GET /api/health - Liveness plus fan-out counters
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let fanout = state.dispatcher.fanout();
    let mut channels = fanout.channels().to_vec();
    channels.sort_by_key(|c| c.as_str());

    Json(HealthResponse {
        status: "ok",
        channels,
        delivery: fanout.stats(),
    })
}
