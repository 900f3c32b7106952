//! Budget pacing handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;

use super::require_user;
use crate::{AppError, AppState};
use beacon_core::pacing::{BudgetPacer, BudgetPacing};

/// GET /api/users/:user_id/budgets/pacing - Pacing across in-window budgets
pub async fn get_budget_pacing(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<BudgetPacing>, AppError> {
    require_user(&state, user_id)?;
    let pacing = BudgetPacer::new(state.db.as_ref()).pacing(user_id, Utc::now())?;
    Ok(Json(pacing))
}
