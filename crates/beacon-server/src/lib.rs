//! Beacon Web Server
//!
//! Axum-based REST API over the Beacon alerting core:
//! - Anomaly detection and anomaly alerts per user
//! - Budget pacing insights and goal projections
//! - Notification inbox and preferences
//! - Transaction recording with inline budget checks
//! - On-demand and scheduled alert sweeps
//!
//! Errors are sanitized before they reach the client; the full error is
//! logged server-side.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use beacon_core::db::Database;
use beacon_core::notify::{AlertDispatcher, ChannelTransport, FanoutQueue};
use beacon_core::{AlertConfig, AlertSweeper};

mod handlers;
mod scheduler;

pub use scheduler::{start_alert_scheduler, AlertScheduleConfig};

/// Maximum pagination limit
pub const MAX_PAGE_LIMIT: i64 = 500;

/// How long shutdown waits for an in-progress sweep to finish its current user
const SCHEDULER_STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub db: Arc<Database>,
    pub alerts: AlertConfig,
    pub dispatcher: Arc<AlertDispatcher>,
    pub sweeper: Arc<AlertSweeper>,
}

impl AppState {
    /// Wire the dispatcher and sweeper with the transports from `alerts`.
    ///
    /// Starts the fan-out worker, so this must run inside a tokio runtime.
    pub fn new(db: Database, alerts: AlertConfig) -> Self {
        let transports = alerts.transports();
        Self::with_transports(db, alerts, transports)
    }

    /// Same as `new` with caller-supplied channel transports
    pub fn with_transports(
        db: Database,
        alerts: AlertConfig,
        transports: Vec<Arc<dyn ChannelTransport>>,
    ) -> Self {
        let db = Arc::new(db);
        let fanout = FanoutQueue::start(transports, alerts.fanout.clone());
        let dispatcher = Arc::new(
            AlertDispatcher::new(db.clone(), db.clone(), fanout)
                .with_dedup_windows(alerts.dedup)
                .with_anomaly_policy(alerts.anomaly_policy.clone()),
        );
        let sweeper = Arc::new(
            AlertSweeper::new(db.clone(), dispatcher.clone())
                .with_analysis_log(db.clone())
                .with_detection(alerts.detection.clone())
                .with_goal_rules(alerts.goals.clone())
                .with_config(alerts.sweep.clone()),
        );

        Self {
            db,
            alerts,
            dispatcher,
            sweeper,
        }
    }
}

/// Success response
#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, config: ServerConfig) -> Router {
    let user_routes = Router::new()
        .route("/anomalies", get(handlers::get_anomalies))
        .route("/anomalies/alerts", post(handlers::send_anomaly_alerts))
        .route("/budgets/pacing", get(handlers::get_budget_pacing))
        .route("/goals/projections", get(handlers::get_goal_projections))
        .route("/notifications", get(handlers::list_notifications))
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route(
            "/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        .route("/transactions", post(handlers::create_transaction));

    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/sweep", post(handlers::run_sweep))
        .nest("/users/:user_id", user_routes);

    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];
    let cors = if config.allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
    };

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server with the given alert configuration
pub async fn serve(db: Database, alerts: AlertConfig, host: &str, port: u16) -> anyhow::Result<()> {
    serve_with_config(db, alerts, host, port, ServerConfig::default()).await
}

/// Start the server with custom configuration
pub async fn serve_with_config(
    db: Database,
    alerts: AlertConfig,
    host: &str,
    port: u16,
    config: ServerConfig,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(db, alerts));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = match AlertScheduleConfig::from_env() {
        Some(schedule) => Some(start_alert_scheduler(
            state.sweeper.clone(),
            schedule,
            shutdown_rx,
        )),
        None => {
            info!("Alert sweep not scheduled (set BEACON_ALERT_SCHEDULE to enable)");
            None
        }
    };

    let app = create_router(state.clone(), config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    stop_background(&state, &shutdown_tx, scheduler).await;
    info!("Server stopped");

    Ok(())
}

/// Stop the scheduler, wait for the user it is on, then drain the fan-out.
///
/// Deliveries enqueued after the fan-out stops are dropped, so the
/// scheduler has to finish first.
async fn stop_background(
    state: &AppState,
    shutdown_tx: &watch::Sender<bool>,
    scheduler: Option<JoinHandle<()>>,
) {
    // No receiver means the scheduler never started
    let _ = shutdown_tx.send(true);

    if let Some(handle) = scheduler {
        match tokio::time::timeout(SCHEDULER_STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Alert scheduler task failed: {}", e),
            Err(_) => warn!(
                "Alert scheduler still running after {:?}, draining deliveries anyway",
                SCHEDULER_STOP_TIMEOUT
            ),
        }
    }

    state.dispatcher.fanout().shutdown().await;
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn internal(msg: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Map validation errors from the core to client errors
    pub fn from_core(err: beacon_core::Error) -> Self {
        match err {
            beacon_core::Error::InvalidData(msg) => Self::bad_request(&msg),
            beacon_core::Error::NotFound(msg) => Self::not_found(&msg),
            other => Self::from(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}

#[cfg(test)]
mod tests;
