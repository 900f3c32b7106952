//! Goal projection handlers

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;

use super::require_user;
use crate::{AppError, AppState};
use beacon_core::goals::{self, GoalProjection};
use beacon_core::models::Goal;

/// A goal with its on-track projection
#[derive(Serialize)]
pub struct GoalWithProjection {
    pub goal: Goal,
    pub projection: GoalProjection,
}

/// GET /api/users/:user_id/goals/projections - Projections for open goals
pub async fn get_goal_projections(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<GoalWithProjection>>, AppError> {
    require_user(&state, user_id)?;
    let now = Utc::now();

    let projections = state
        .db
        .list_goals(user_id)?
        .into_iter()
        .filter(|g| !g.is_achieved)
        .map(|goal| {
            let projection = goals::project(&goal, now, &state.alerts.goals);
            GoalWithProjection { goal, projection }
        })
        .collect();

    Ok(Json(projections))
}
