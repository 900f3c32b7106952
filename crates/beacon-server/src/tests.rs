//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use beacon_core::models::{
    AlertKind, BudgetPeriod, Channel, NewBudget, NewGoal, NewTransaction, NotificationTrigger,
    TransactionKind,
};
use beacon_core::notify::MockChannel;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use tower::ServiceExt;

struct TestApp {
    state: Arc<AppState>,
    email: MockChannel,
    bot: MockChannel,
}

impl TestApp {
    fn new() -> Self {
        Self::with_channels(
            MockChannel::new(Channel::Email),
            MockChannel::new(Channel::Bot),
        )
    }

    fn with_channels(email: MockChannel, bot: MockChannel) -> Self {
        let db = Database::in_memory().unwrap();
        let state = Arc::new(AppState::with_transports(
            db,
            AlertConfig::default(),
            vec![Arc::new(email.clone()), Arc::new(bot.clone())],
        ));
        Self { state, email, bot }
    }

    fn router(&self) -> Router {
        create_router(self.state.clone(), ServerConfig::default())
    }

    fn user(&self, email: &str) -> i64 {
        self.state.db.create_user(email, None).unwrap()
    }

    async fn get(&self, uri: &str) -> axum::response::Response {
        self.router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn send(&self, method: &str, uri: &str, body: serde_json::Value) -> axum::response::Response {
        self.router()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::to_string(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn post(&self, uri: &str) -> axum::response::Response {
        self.router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Five ordinary dining expenses and one large one, all within the last two weeks
fn seed_dining(db: &Database, user_id: i64) {
    let dining = db.upsert_category(user_id, "Dining").unwrap();
    for (i, amount) in [50_000.0, 55_000.0, 48_000.0, 52_000.0, 300_000.0, 51_000.0]
        .iter()
        .enumerate()
    {
        db.create_transaction(&NewTransaction {
            user_id,
            category_id: Some(dining),
            amount: *amount,
            kind: TransactionKind::Expense,
            description: Some("dinner".to_string()),
            occurred_at: Utc::now() - Duration::days(12 - i as i64),
        })
        .unwrap();
    }
}

// ========== Health ==========

#[tokio::test]
async fn test_health_reports_channels() {
    let app = TestApp::new();

    let response = app.get("/api/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );

    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["channels"], serde_json::json!(["bot", "email"]));
    assert_eq!(json["delivery"]["dropped"], 0);
}

#[tokio::test]
async fn test_unknown_user_is_not_found() {
    let app = TestApp::new();

    let response = app.get("/api/users/42/budgets/pacing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = get_body_json(response).await;
    assert_eq!(json["error"], "User not found");
}

// ========== Anomalies ==========

#[tokio::test]
async fn test_get_anomalies_records_analysis() {
    let app = TestApp::new();
    let user_id = app.user("dee@example.com");
    seed_dining(&app.state.db, user_id);

    let response = app.get(&format!("/api/users/{}/anomalies", user_id)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["threshold"], 3.5);
    assert_eq!(json["transactions_scanned"], 6);
    let anomalies = json["anomalies"].as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["amount"], 300_000.0);
    assert_eq!(anomalies[0]["category_name"], "Dining");

    let records = app.state.db.list_analysis_records(user_id, 10).unwrap();
    assert_eq!(records.len(), 1);

    // Detection alone never notifies
    assert!(app
        .state
        .db
        .list_notifications(user_id, false, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_get_anomalies_rejects_bad_dates() {
    let app = TestApp::new();
    let user_id = app.user("dee@example.com");

    let response = app
        .get(&format!("/api/users/{}/anomalies?start=yesterday", user_id))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_anomaly_alerts_dispatch_once() {
    let app = TestApp::new();
    let user_id = app.user("dee@example.com");
    seed_dining(&app.state.db, user_id);
    let uri = format!("/api/users/{}/anomalies/alerts", user_id);

    let response = app.post(&uri).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["anomalies_found"], 1);
    assert_eq!(json["outcomes"][0]["status"], "fanned_out");
    assert_eq!(
        json["outcomes"][0]["channels"],
        serde_json::json!(["email", "bot"])
    );

    // Same transaction inside the lookback window
    let json = get_body_json(app.post(&uri).await).await;
    assert_eq!(json["outcomes"][0]["status"], "suppressed");
    assert_eq!(json["outcomes"][0]["reason"]["reason"], "duplicate");

    app.state.dispatcher.fanout().flush().await;
    assert_eq!(app.email.sent_count(), 1);
    assert_eq!(app.bot.sent_count(), 1);
    assert_eq!(
        app.state.db.list_notifications(user_id, false, 10).unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_anomaly_alerts_respect_min_score() {
    let app = TestApp::new();
    let user_id = app.user("dee@example.com");
    seed_dining(&app.state.db, user_id);

    // Lower caller thresholds cannot go below the configured floor
    let json = get_body_json(
        app.post(&format!(
            "/api/users/{}/anomalies/alerts?min_score=0.1",
            user_id
        ))
        .await,
    )
    .await;
    assert_eq!(json["outcomes"].as_array().unwrap().len(), 1);
}

// ========== Budgets and transactions ==========

#[tokio::test]
async fn test_transaction_triggers_budget_alerts() {
    let app = TestApp::new();
    let user_id = app.user("pat@example.com");
    let now = Utc::now();
    app.state
        .db
        .create_budget(&NewBudget {
            user_id,
            name: "Groceries".to_string(),
            category_id: None,
            amount: 100.0,
            period: BudgetPeriod::Custom,
            start_date: now - Duration::days(10),
            end_date: now + Duration::days(20),
            alert_threshold: None,
        })
        .unwrap();

    let response = app
        .send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 150.0, "category": "Groceries" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert!(json["id"].as_i64().unwrap() > 0);
    // Exceeded plus over pace
    assert_eq!(json["alerts"].as_array().unwrap().len(), 2);

    let kinds: Vec<String> = app
        .state
        .db
        .list_notifications(user_id, false, 10)
        .unwrap()
        .iter()
        .map(|n| n.kind.as_str().to_string())
        .collect();
    assert!(kinds.contains(&"budget_exceeded".to_string()));
    assert!(kinds.contains(&"budget_pacing".to_string()));

    // A second expense in the same window does not repeat them
    let json = get_body_json(
        app.send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 5.0 }),
        )
        .await,
    )
    .await;
    assert!(json["alerts"]
        .as_array()
        .unwrap()
        .iter()
        .all(|o| o["status"] == "suppressed"));

    let pacing = get_body_json(app.get(&format!("/api/users/{}/budgets/pacing", user_id)).await).await;
    assert_eq!(pacing["budgets"][0]["spent"], 155.0);
    assert_eq!(pacing["budgets"][0]["is_over_pace"], true);
}

fn groceries_budget(app: &TestApp, user_id: i64) {
    let now = Utc::now();
    app.state
        .db
        .create_budget(&NewBudget {
            user_id,
            name: "Groceries".to_string(),
            category_id: None,
            amount: 100.0,
            period: BudgetPeriod::Custom,
            start_date: now - Duration::days(10),
            end_date: now + Duration::days(20),
            alert_threshold: None,
        })
        .unwrap();
}

#[tokio::test]
async fn test_transaction_returns_before_slow_delivery() {
    let email = MockChannel::slow(Channel::Email, std::time::Duration::from_secs(3));
    let app = TestApp::with_channels(email.clone(), MockChannel::new(Channel::Bot));
    let user_id = app.user("kim@example.com");
    groceries_budget(&app, user_id);

    let started = std::time::Instant::now();
    let response = app
        .send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 150.0 }),
        )
        .await;
    let elapsed = started.elapsed();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(elapsed < std::time::Duration::from_secs(1), "took {:?}", elapsed);
    assert_eq!(email.sent_count(), 0);

    // The alert is already in the inbox
    let json = get_body_json(response).await;
    assert_eq!(json["alerts"][0]["status"], "fanned_out");
    assert!(app.state.db.unread_count(user_id).unwrap() > 0);
}

#[tokio::test]
async fn test_large_expense_alerts_inline() {
    let app = TestApp::new();
    let user_id = app.user("lee@example.com");

    let json = get_body_json(
        app.send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 2_500_000.0, "category": "Travel" }),
        )
        .await,
    )
    .await;
    assert_eq!(json["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(json["alerts"][0]["status"], "fanned_out");

    let notifications = app.state.db.list_notifications(user_id, false, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, AlertKind::LargeTransaction);
    assert_eq!(notifications[0].metadata["category_name"], "Travel");
    assert_eq!(
        notifications[0].metadata["transaction_id"],
        json["id"].as_i64().unwrap()
    );

    // Below the configured amount: nothing
    let json = get_body_json(
        app.send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 900_000.0 }),
        )
        .await,
    )
    .await;
    assert!(json["alerts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_income_skips_budget_checks() {
    let app = TestApp::new();
    let user_id = app.user("pat@example.com");

    let json = get_body_json(
        app.send(
            "POST",
            &format!("/api/users/{}/transactions", user_id),
            serde_json::json!({ "amount": 2000.0, "kind": "income" }),
        )
        .await,
    )
    .await;
    assert_eq!(json["alerts"], serde_json::json!([]));
}

#[tokio::test]
async fn test_invalid_transactions_rejected() {
    let app = TestApp::new();
    let user_id = app.user("pat@example.com");
    let uri = format!("/api/users/{}/transactions", user_id);

    let response = app.send("POST", &uri, serde_json::json!({ "amount": -3.0 })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send("POST", &uri, serde_json::json!({ "category": "Dining" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Goals ==========

#[tokio::test]
async fn test_goal_projections() {
    let app = TestApp::new();
    let user_id = app.user("lee@example.com");
    app.state
        .db
        .create_goal(&NewGoal {
            user_id,
            title: "Emergency fund".to_string(),
            target_amount: 1200.0,
            current_amount: 600.0,
            target_date: Some(Utc::now() + Duration::days(365)),
        })
        .unwrap();

    let json = get_body_json(
        app.get(&format!("/api/users/{}/goals/projections", user_id))
            .await,
    )
    .await;
    let items = json.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["goal"]["title"], "Emergency fund");
    assert_eq!(items[0]["projection"]["progress_pct"], 50.0);
    assert_eq!(items[0]["projection"]["on_track"], true);
}

// ========== Notifications ==========

#[tokio::test]
async fn test_notification_inbox() {
    let app = TestApp::new();
    let user_id = app.user("dee@example.com");
    seed_dining(&app.state.db, user_id);
    app.post(&format!("/api/users/{}/anomalies/alerts", user_id))
        .await;

    let json = get_body_json(
        app.get(&format!("/api/users/{}/notifications?unread_only=true", user_id))
            .await,
    )
    .await;
    assert_eq!(json["unread_count"], 1);
    let id = json["notifications"][0]["id"].as_i64().unwrap();
    assert_eq!(json["notifications"][0]["kind"], "anomaly");

    let response = app
        .post(&format!("/api/users/{}/notifications/{}/read", user_id, id))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    // Another user's id space
    let response = app
        .post(&format!("/api/users/{}/notifications/{}/read", user_id + 1, id))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = get_body_json(
        app.post(&format!("/api/users/{}/notifications/read-all", user_id))
            .await,
    )
    .await;
    assert_eq!(json["updated"], 0);

    let json = get_body_json(
        app.get(&format!("/api/users/{}/notifications", user_id))
            .await,
    )
    .await;
    assert_eq!(json["unread_count"], 0);
    assert_eq!(json["notifications"].as_array().unwrap().len(), 1);
}

// ========== Preferences ==========

#[tokio::test]
async fn test_preferences_round_trip() {
    let app = TestApp::new();
    let user_id = app.user("kim@example.com");
    let uri = format!("/api/users/{}/preferences", user_id);

    let json = get_body_json(app.get(&uri).await).await;
    assert_eq!(json["email_enabled"], true);
    assert_eq!(json["low_notifications"], true);

    let response = app
        .send(
            "PUT",
            &uri,
            serde_json::json!({ "email_enabled": false, "quiet_hours_start": "22:00", "quiet_hours_end": "07:00" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(app.get(&uri).await).await;
    assert_eq!(json["email_enabled"], false);
    assert_eq!(json["bot_enabled"], true);
    assert_eq!(json["quiet_hours_start"], "22:00");
}

#[tokio::test]
async fn test_preferences_validation() {
    let app = TestApp::new();
    let user_id = app.user("kim@example.com");
    let uri = format!("/api/users/{}/preferences", user_id);

    let response = app
        .send("PUT", &uri, serde_json::json!({ "quiet_hours_start": "25:99", "quiet_hours_end": "07:00" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send("PUT", &uri, serde_json::json!({ "quiet_hours_start": "22:00" }))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_disabled_channel_not_delivered() {
    let app = TestApp::new();
    let user_id = app.user("kim@example.com");
    seed_dining(&app.state.db, user_id);
    app.send(
        "PUT",
        &format!("/api/users/{}/preferences", user_id),
        serde_json::json!({ "bot_enabled": false }),
    )
    .await;

    let json = get_body_json(
        app.post(&format!("/api/users/{}/anomalies/alerts", user_id))
            .await,
    )
    .await;
    assert_eq!(json["outcomes"][0]["channels"], serde_json::json!(["email"]));

    app.state.dispatcher.fanout().flush().await;
    assert_eq!(app.email.sent_count(), 1);
    assert_eq!(app.bot.sent_count(), 0);
}

// ========== Sweep ==========

#[tokio::test]
async fn test_manual_sweep() {
    let app = TestApp::new();
    let first = app.user("a@example.com");
    app.user("b@example.com");
    seed_dining(&app.state.db, first);

    let response = app.post("/api/sweep").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["users_total"], 2);
    assert_eq!(json["users_processed"], 2);
    assert_eq!(json["users_failed"], 0);
    assert_eq!(json["interrupted"], false);
}

// ========== Shutdown ==========

#[tokio::test]
async fn test_shutdown_waits_for_scheduler_before_draining() {
    let app = TestApp::new();
    let user_id = app.user("max@example.com");
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    // Stands in for a sweep that finishes its current user after the signal
    let dispatcher = app.state.dispatcher.clone();
    let scheduler = tokio::spawn(async move {
        let _ = shutdown_rx.changed().await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let trigger = NotificationTrigger::new(
            user_id,
            AlertKind::BudgetExceeded,
            "Budget exceeded",
            "Budget 'Rent' is over at 120.0%!",
        );
        dispatcher.dispatch_at(trigger, Utc::now()).unwrap();
    });

    stop_background(&app.state, &shutdown_tx, Some(scheduler)).await;

    assert_eq!(app.email.sent_count(), 1);
    assert_eq!(app.bot.sent_count(), 1);
    assert_eq!(app.state.dispatcher.fanout().stats().dropped, 0);
}
