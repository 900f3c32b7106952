//! Transaction handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{read_json, require_user};
use crate::{AppError, AppState};
use beacon_core::models::{NewTransaction, TransactionKind};
use beacon_core::DispatchOutcome;

/// Request body for recording a transaction
#[derive(Debug, Deserialize)]
pub struct CreateTransactionRequest {
    pub amount: f64,
    /// Category name, created on first use
    pub category: Option<String>,
    #[serde(default = "default_kind")]
    pub kind: TransactionKind,
    pub description: Option<String>,
    /// Defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
}

fn default_kind() -> TransactionKind {
    TransactionKind::Expense
}

/// Response for a recorded transaction
#[derive(Serialize)]
pub struct CreateTransactionResponse {
    pub id: i64,
    /// Alerts raised by this write (delivery continues in the background)
    pub alerts: Vec<DispatchOutcome>,
}

/// POST /api/users/:user_id/transactions - Record a transaction and run the
/// large-expense and budget checks. Channel delivery happens in the background.
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    request: Request,
) -> Result<Json<CreateTransactionResponse>, AppError> {
    require_user(&state, user_id)?;
    let req: CreateTransactionRequest = read_json(request, 16 * 1024).await?;

    let category_id = match req.category.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(state.db.upsert_category(user_id, name)?),
        _ => None,
    };

    let now = Utc::now();
    let id = state
        .db
        .create_transaction(&NewTransaction {
            user_id,
            category_id,
            amount: req.amount,
            kind: req.kind,
            description: req.description,
            occurred_at: req.occurred_at.unwrap_or(now),
        })
        .map_err(AppError::from_core)?;

    // The write already succeeded; a failed check must not undo it
    let alerts = inline_alerts(&state, id, now).unwrap_or_else(|e| {
        warn!(user_id, transaction_id = id, error = %e, "Inline transaction checks failed");
        Vec::new()
    });

    debug!(user_id, transaction_id = id, alerts = alerts.len(), "Transaction recorded");

    Ok(Json(CreateTransactionResponse { id, alerts }))
}

fn inline_alerts(
    state: &AppState,
    transaction_id: i64,
    now: DateTime<Utc>,
) -> beacon_core::Result<Vec<DispatchOutcome>> {
    let tx = state.db.get_transaction(transaction_id)?.ok_or_else(|| {
        beacon_core::Error::NotFound(format!("transaction {}", transaction_id))
    })?;
    state.sweeper.check_transaction(&tx, now)
}
