//! Notification preference handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use tracing::info;

use super::{read_json, require_user};
use crate::{AppError, AppState};
use beacon_core::models::NotificationPreferences;
use beacon_core::store::PreferencesStore;

/// GET /api/users/:user_id/preferences - Stored preferences or the defaults
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<NotificationPreferences>, AppError> {
    require_user(&state, user_id)?;
    let prefs = state.db.get_preferences(user_id)?;
    Ok(Json(prefs))
}

/// PUT /api/users/:user_id/preferences - Replace preferences
///
/// Missing fields take their defaults. Quiet hours must be `HH:MM` pairs.
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    request: Request,
) -> Result<Json<NotificationPreferences>, AppError> {
    require_user(&state, user_id)?;
    let prefs: NotificationPreferences = read_json(request, 8 * 1024).await?;

    state
        .db
        .update_preferences(user_id, &prefs)
        .map_err(AppError::from_core)?;
    info!(user_id, "Notification preferences updated");

    Ok(Json(prefs))
}
