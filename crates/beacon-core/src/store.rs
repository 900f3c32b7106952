//! Collaborator interfaces consumed by the detection and dispatch core
//!
//! The core never reaches for a global connection. Each component receives
//! the stores it needs at construction time. `Database` implements all of
//! them; `test_utils::MemoryStore` implements them in memory for tests.

use chrono::{DateTime, Utc};

use crate::detect::DetectionResult;
use crate::error::Result;
use crate::models::{
    AlertKind, Budget, Goal, NewNotification, Notification, NotificationPreferences, SubjectKey,
    Transaction,
};

/// Read access to users' ledgers
pub trait LedgerStore: Send + Sync {
    /// Every user the periodic sweep should visit
    fn list_user_ids(&self) -> Result<Vec<i64>>;

    /// Expense transactions with `start <= occurred_at <= end`, oldest first
    fn list_expenses(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>>;

    /// Budgets flagged active. Callers decide window membership against `now`.
    fn list_active_budgets(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<Budget>>;

    /// Goals not yet marked achieved
    fn list_open_goals(&self, user_id: i64) -> Result<Vec<Goal>>;

    /// Flag a goal as achieved so it stops producing goal alerts
    fn mark_goal_achieved(&self, goal_id: i64) -> Result<()>;
}

/// Persisted notification history
pub trait NotificationLog: Send + Sync {
    fn create_notification(&self, notification: &NewNotification) -> Result<i64>;

    /// Most recent notification of `kind` for `subject` created after `since`
    fn find_recent(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>>;
}

/// Per-user notification preferences
pub trait PreferencesStore: Send + Sync {
    /// Must return `NotificationPreferences::default()` when nothing is stored
    fn get_preferences(&self, user_id: i64) -> Result<NotificationPreferences>;
}

/// Audit trail of detection runs
pub trait AnalysisLog: Send + Sync {
    /// Store a detection run and return the record id
    fn record_analysis(&self, result: &DetectionResult) -> Result<i64>;
}
