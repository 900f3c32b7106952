//! Notification inbox handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::require_user;
use crate::{AppError, AppState, SuccessResponse, MAX_PAGE_LIMIT};
use beacon_core::models::Notification;

/// Query parameters for listing notifications
#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// Notification list response
#[derive(Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// Mark-all response
#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: usize,
}

/// GET /api/users/:user_id/notifications - Newest first
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(params): Query<NotificationQuery>,
) -> Result<Json<NotificationListResponse>, AppError> {
    require_user(&state, user_id)?;
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);

    let notifications = state
        .db
        .list_notifications(user_id, params.unread_only, limit)?;
    let unread_count = state.db.unread_count(user_id)?;

    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

/// POST /api/users/:user_id/notifications/:id/read - Mark one notification read
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Path((user_id, id)): Path<(i64, i64)>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db.mark_notification_read(user_id, id)? {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// POST /api/users/:user_id/notifications/read-all - Mark every notification read
pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<MarkAllReadResponse>, AppError> {
    require_user(&state, user_id)?;
    let updated = state.db.mark_all_notifications_read(user_id)?;
    Ok(Json(MarkAllReadResponse { updated }))
}
