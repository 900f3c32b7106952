//! Integration tests for beacon-core
//!
//! These tests exercise the ledger → detect/pace → dispatch → fan-out
//! workflow against a real database.

use std::sync::Arc;

use beacon_core::{
    config::AlertConfig,
    db::Database,
    detect::AnomalyDetector,
    models::{
        AlertKind, BudgetPeriod, Channel, NewBudget, NewGoal, NewTransaction,
        NotificationPreferences, TransactionKind,
    },
    notify::{AlertDispatcher, FanoutConfig, FanoutQueue, MockChannel},
    pacing::BudgetPacer,
    stats::RobustStats,
    store::PreferencesStore,
    sweep::AlertSweeper,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 11, 8, 0, 0).unwrap()
}

fn add_expense(db: &Database, user_id: i64, category: &str, amount: f64, at: DateTime<Utc>) -> i64 {
    let category_id = db.upsert_category(user_id, category).unwrap();
    db.create_transaction(&NewTransaction {
        user_id,
        category_id: Some(category_id),
        amount,
        kind: TransactionKind::Expense,
        description: Some(format!("{} purchase", category)),
        occurred_at: at,
    })
    .unwrap()
}

/// Dining history with one obvious outlier
fn seed_dining(db: &Database, user_id: i64) -> i64 {
    let mut outlier = 0;
    for (i, amount) in [50_000.0, 55_000.0, 48_000.0, 52_000.0, 300_000.0, 51_000.0]
        .iter()
        .enumerate()
    {
        let id = add_expense(db, user_id, "Dining", *amount, now() - Duration::days(12 - i as i64));
        if *amount == 300_000.0 {
            outlier = id;
        }
    }
    outlier
}

struct Harness {
    db: Arc<Database>,
    email: MockChannel,
    bot: MockChannel,
    sweeper: AlertSweeper,
}

fn harness() -> Harness {
    let db = Arc::new(Database::in_memory().expect("Failed to create in-memory database"));
    let email = MockChannel::new(Channel::Email);
    let bot = MockChannel::new(Channel::Bot);
    let fanout = FanoutQueue::start(
        vec![Arc::new(email.clone()), Arc::new(bot.clone())],
        FanoutConfig::default(),
    );
    let dispatcher = Arc::new(AlertDispatcher::new(db.clone(), db.clone(), fanout));
    let sweeper = AlertSweeper::new(db.clone(), dispatcher).with_analysis_log(db.clone());
    Harness {
        db,
        email,
        bot,
        sweeper,
    }
}

// =============================================================================
// Statistics and detection
// =============================================================================

#[test]
fn test_dining_outlier_scores() {
    let stats = RobustStats::from_amounts(&[50_000.0, 55_000.0, 48_000.0, 52_000.0, 300_000.0, 51_000.0]);
    assert_eq!(stats.median, 51_500.0);
    assert_eq!(stats.mad, 2_500.0);

    let z = stats.z_score(300_000.0);
    assert!((z - 67.04).abs() < 0.1, "z = {}", z);
}

#[test]
fn test_detect_against_database() {
    let db = Database::in_memory().unwrap();
    let user_id = db.create_user("dee@example.com", None).unwrap();
    let outlier = seed_dining(&db, user_id);

    let result = AnomalyDetector::new(&db)
        .detect(user_id, now() - Duration::days(30), now(), 0.0)
        .unwrap();

    assert_eq!(result.threshold, 3.5);
    assert_eq!(result.transactions_scanned, 6);
    assert_eq!(result.anomalies.len(), 1);
    assert_eq!(result.anomalies[0].transaction_id, outlier);
    assert_eq!(result.anomalies[0].score, 1.0);
    assert_eq!(result.anomalies[0].category_name, "Dining");
}

// =============================================================================
// Pacing
// =============================================================================

#[test]
fn test_budget_pacing_example() {
    let db = Database::in_memory().unwrap();
    let user_id = db.create_user("pat@example.com", None).unwrap();
    let start = now() - Duration::days(10);

    let budget_id = db
        .create_budget(&NewBudget {
            user_id,
            name: "Household".to_string(),
            category_id: None,
            amount: 1_000_000.0,
            period: BudgetPeriod::Custom,
            start_date: start,
            end_date: start + Duration::days(30),
            alert_threshold: None,
        })
        .unwrap();
    add_expense(&db, user_id, "Household", 500_000.0, now() - Duration::days(2));

    let pacing = BudgetPacer::new(&db).pacing(user_id, now()).unwrap();
    let pace = &pacing.budgets[0];

    assert_eq!(pace.usage_pct, 50.0);
    assert!((pace.allowed_pace_pct - 33.33).abs() < 0.01);
    assert!(pace.is_over_pace);
    assert_eq!(pacing.risk_budget_ids, vec![budget_id]);
    assert_eq!(pacing.days_left, 20);
    assert_eq!(pacing.safe_to_spend_daily, 25_000.0);
}

// =============================================================================
// Full sweep workflow
// =============================================================================

#[tokio::test]
async fn test_full_sweep_workflow() {
    let h = harness();
    let user_id = h.db.create_user("sam@example.com", Some("Sam")).unwrap();
    seed_dining(&h.db, user_id);

    h.db.create_budget(&NewBudget {
        user_id,
        name: "Everything".to_string(),
        category_id: None,
        amount: 400_000.0,
        period: BudgetPeriod::Monthly,
        start_date: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
        end_date: Utc.with_ymd_and_hms(2024, 5, 31, 23, 59, 59).unwrap(),
        alert_threshold: None,
    })
    .unwrap();

    h.db.create_goal(&NewGoal {
        user_id,
        title: "Car".to_string(),
        target_amount: 10_000.0,
        current_amount: 7_600.0,
        target_date: Some(now() + Duration::days(12)),
    })
    .unwrap();

    let report = h.sweeper.run_once(now()).unwrap();
    h.sweeper.dispatcher().fanout().flush().await;

    assert_eq!(report.users_processed, 1);
    assert_eq!(report.users_failed, 0);

    let notifications = h.db.list_notifications(user_id, false, 50).unwrap();
    let kinds: Vec<AlertKind> = notifications.iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&AlertKind::Anomaly));
    assert!(kinds.contains(&AlertKind::BudgetExceeded));
    assert!(kinds.contains(&AlertKind::GoalDeadline));
    assert!(kinds.contains(&AlertKind::GoalMilestone));
    assert_eq!(report.alerts_sent, notifications.len());

    // Each persisted alert reaches both external channels
    assert_eq!(h.email.sent_count(), notifications.len());
    assert_eq!(h.bot.sent_count(), notifications.len());

    // One audit record per detection run
    assert_eq!(h.db.list_analysis_records(user_id, 10).unwrap().len(), 1);

    // A second sweep inside the lookback windows issues nothing new
    let again = h.sweeper.run_once(now() + Duration::hours(2)).unwrap();
    assert_eq!(again.alerts_sent, 0);
    assert_eq!(
        h.db.list_notifications(user_id, false, 50).unwrap().len(),
        notifications.len()
    );
}

#[tokio::test]
async fn test_channel_preferences_keep_in_app_record() {
    let h = harness();
    let user_id = h.db.create_user("kim@example.com", None).unwrap();
    seed_dining(&h.db, user_id);
    h.db.update_preferences(
        user_id,
        &NotificationPreferences {
            email_enabled: false,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(!h.db.get_preferences(user_id).unwrap().email_enabled);

    h.sweeper.run_once(now()).unwrap();
    h.sweeper.dispatcher().fanout().flush().await;

    assert_eq!(h.db.list_notifications(user_id, false, 10).unwrap().len(), 1);
    assert_eq!(h.email.sent_count(), 0);
    assert_eq!(h.bot.sent_count(), 1);
}

#[tokio::test]
async fn test_achieved_goal_is_marked() {
    let h = harness();
    let user_id = h.db.create_user("lee@example.com", None).unwrap();
    let goal_id = h
        .db
        .create_goal(&NewGoal {
            user_id,
            title: "Bike".to_string(),
            target_amount: 800.0,
            current_amount: 820.0,
            target_date: None,
        })
        .unwrap();

    h.sweeper.run_once(now()).unwrap();

    let goals = h.db.list_goals(user_id).unwrap();
    assert!(goals.iter().any(|g| g.id == goal_id && g.is_achieved));
    let notifications = h.db.list_notifications(user_id, false, 10).unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, AlertKind::GoalAchieved);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_file_overrides() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.toml");
    std::fs::write(
        &path,
        r#"
        [dispatch]
        max_anomalies_per_run = 5

        [dedup]
        budget_hours = 6
        "#,
    )
    .unwrap();

    let config = AlertConfig::load(Some(path.as_path())).unwrap();
    assert_eq!(config.anomaly_policy.max_per_run, 5);
    assert_eq!(config.dedup.budget, Duration::hours(6));
    assert_eq!(config.detection.threshold, 3.5);
}
