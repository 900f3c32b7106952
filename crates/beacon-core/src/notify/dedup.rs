//! Lookback-window deduplication
//!
//! A trigger is suppressed when the notification log already holds a
//! notification of the same kind, for the same user and the same subject key,
//! created inside the kind's lookback window. The match is exact on the
//! subject key column, so unrelated subjects never suppress each other.
//!
//! Concurrency: the check and the later insert are separate statements. Two
//! triggers for the same subject racing through the gate can both pass and
//! produce two notifications. That duplicate is accepted; no lock is taken.
//!
//! Store failure: a failed lookup is treated as "not found" and the alert
//! goes out. A duplicate is preferred over a lost alert.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{AlertKind, Feature, SubjectKey};
use crate::store::NotificationLog;

/// Lookback windows per alert family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupWindows {
    pub budget: Duration,
    pub goal: Duration,
    pub anomaly: Duration,
}

impl Default for DedupWindows {
    fn default() -> Self {
        Self {
            budget: Duration::hours(24),
            goal: Duration::days(7),
            anomaly: Duration::days(7),
        }
    }
}

impl DedupWindows {
    pub fn window_for(&self, kind: AlertKind) -> Duration {
        match kind.feature() {
            Feature::Budget => self.budget,
            Feature::Goal => self.goal,
            Feature::Anomaly | Feature::Analytics => self.anomaly,
        }
    }
}

/// Decides whether an equivalent alert was issued recently
#[derive(Clone)]
pub struct DedupGate {
    log: Arc<dyn NotificationLog>,
    windows: DedupWindows,
}

impl DedupGate {
    pub fn new(log: Arc<dyn NotificationLog>) -> Self {
        Self::with_windows(log, DedupWindows::default())
    }

    pub fn with_windows(log: Arc<dyn NotificationLog>, windows: DedupWindows) -> Self {
        Self { log, windows }
    }

    pub fn windows(&self) -> &DedupWindows {
        &self.windows
    }

    /// Existing notification id when `(user, kind, subject)` was notified
    /// within `lookback` of `now`. Lookup failures fail open (None).
    pub fn find_duplicate(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        match self.log.find_recent(user_id, kind, subject, now - lookback) {
            Ok(Some(existing)) => {
                debug!(
                    user_id,
                    kind = kind.as_str(),
                    subject = %subject,
                    existing_id = existing.id,
                    "Duplicate alert within lookback window"
                );
                Some(existing.id)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    user_id,
                    kind = kind.as_str(),
                    subject = %subject,
                    error = %e,
                    "Dedup lookup failed, letting alert through"
                );
                None
            }
        }
    }

    /// True when the alert should be suppressed
    pub fn should_suppress(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        lookback: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        self.find_duplicate(user_id, kind, subject, lookback, now)
            .is_some()
    }

    /// Same as `find_duplicate` using the kind's configured window
    pub fn find_duplicate_for_kind(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        self.find_duplicate(user_id, kind, subject, self.windows.window_for(kind), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewNotification, Priority};
    use crate::test_utils::MemoryStore;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 10, 12, 0, 0).unwrap()
    }

    fn record(store: &MemoryStore, kind: AlertKind, subject: SubjectKey, at: DateTime<Utc>) {
        store
            .create_notification(&NewNotification {
                user_id: 1,
                kind,
                notification_type: kind.notification_type(),
                priority: Priority::High,
                title: "t".to_string(),
                message: "m".to_string(),
                subject_key: Some(subject),
                metadata: serde_json::json!({}),
                created_at: at,
            })
            .unwrap();
    }

    #[test]
    fn test_suppresses_inside_window_only() {
        let store = Arc::new(MemoryStore::new());
        record(
            &store,
            AlertKind::BudgetThreshold,
            SubjectKey::budget(3),
            now() - Duration::hours(23),
        );
        let gate = DedupGate::new(store.clone());

        assert!(gate.should_suppress(
            1,
            AlertKind::BudgetThreshold,
            &SubjectKey::budget(3),
            Duration::hours(24),
            now()
        ));
        assert!(!gate.should_suppress(
            1,
            AlertKind::BudgetThreshold,
            &SubjectKey::budget(3),
            Duration::hours(12),
            now()
        ));
    }

    #[test]
    fn test_scope_is_user_kind_and_exact_subject() {
        let store = Arc::new(MemoryStore::new());
        record(&store, AlertKind::Anomaly, SubjectKey::transaction(1), now());
        let gate = DedupGate::new(store.clone());
        let week = Duration::days(7);

        // transaction:1 must not match transaction:12
        assert!(!gate.should_suppress(1, AlertKind::Anomaly, &SubjectKey::transaction(12), week, now()));
        assert!(!gate.should_suppress(2, AlertKind::Anomaly, &SubjectKey::transaction(1), week, now()));
        assert!(!gate.should_suppress(
            1,
            AlertKind::BudgetExceeded,
            &SubjectKey::transaction(1),
            week,
            now()
        ));
        assert!(gate.should_suppress(1, AlertKind::Anomaly, &SubjectKey::transaction(1), week, now()));
    }

    #[test]
    fn test_lookup_failure_fails_open() {
        let store = Arc::new(MemoryStore::new());
        record(&store, AlertKind::Anomaly, SubjectKey::transaction(1), now());
        store.fail_notification_reads(true);

        let gate = DedupGate::new(store.clone());
        assert!(!gate.should_suppress(
            1,
            AlertKind::Anomaly,
            &SubjectKey::transaction(1),
            Duration::days(7),
            now()
        ));
    }

    #[test]
    fn test_window_per_kind() {
        let windows = DedupWindows::default();
        assert_eq!(windows.window_for(AlertKind::BudgetExceeded), Duration::hours(24));
        assert_eq!(windows.window_for(AlertKind::GoalMilestone), Duration::days(7));
        assert_eq!(windows.window_for(AlertKind::Anomaly), Duration::days(7));
    }

    #[test]
    fn test_windows_per_kind() {
        let windows = DedupWindows::default();
        assert_eq!(windows.window_for(AlertKind::BudgetPacing), Duration::hours(24));
        assert_eq!(windows.window_for(AlertKind::GoalMilestone), Duration::days(7));
        assert_eq!(windows.window_for(AlertKind::LargeTransaction), Duration::days(7));
    }
}
