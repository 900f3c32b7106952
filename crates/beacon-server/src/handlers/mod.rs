//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area. Per-user
//! routes resolve the user first and answer 404 for unknown ids.

pub mod anomalies;
pub mod budgets;
pub mod goals;
pub mod health;
pub mod notifications;
pub mod preferences;
pub mod sweep;
pub mod transactions;

// Re-export all handlers for use in router
pub use anomalies::*;
pub use budgets::*;
pub use goals::*;
pub use health::*;
pub use notifications::*;
pub use preferences::*;
pub use sweep::*;
pub use transactions::*;

use beacon_core::models::User;

use crate::{AppError, AppState};

/// Look up the user a per-user route is addressed to
pub(crate) fn require_user(state: &AppState, user_id: i64) -> Result<User, AppError> {
    state
        .db
        .get_user(user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))
}

/// Read a JSON request body, rejecting anything malformed as a 400
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    request: axum::extract::Request,
    max_bytes: usize,
) -> Result<T, AppError> {
    let bytes = axum::body::to_bytes(request.into_body(), max_bytes)
        .await
        .map_err(|_| AppError::bad_request("Invalid request body"))?;
    serde_json::from_slice(&bytes).map_err(|_| AppError::bad_request("Invalid JSON"))
}
