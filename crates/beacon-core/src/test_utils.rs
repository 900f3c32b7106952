//! Test utilities for beacon-core
//!
//! `MemoryStore` implements every store trait in memory, with switches for
//! injecting failures into individual operations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::detect::DetectionResult;
use crate::error::{Error, Result};
use crate::models::{
    AlertKind, Budget, Goal, NewNotification, Notification, NotificationPreferences, SubjectKey,
    Transaction, TransactionKind,
};
use crate::store::{AnalysisLog, LedgerStore, NotificationLog, PreferencesStore};

pub use crate::notify::MockChannel;

#[derive(Default)]
struct Inner {
    users: Vec<i64>,
    transactions: Vec<Transaction>,
    budgets: Vec<Budget>,
    goals: Vec<Goal>,
    notifications: Vec<Notification>,
    preferences: HashMap<i64, NotificationPreferences>,
    analyses: Vec<DetectionResult>,
}

/// In-memory implementation of all store traits
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_notification_reads: AtomicBool,
    fail_notification_writes: AtomicBool,
    fail_preferences: AtomicBool,
    failing_ledgers: Mutex<HashSet<i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user_id: i64) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.users.contains(&user_id) {
            inner.users.push(user_id);
        }
    }

    /// Record an expense and return its id
    pub fn add_expense(
        &self,
        user_id: i64,
        category_id: i64,
        category_name: &str,
        amount: f64,
        occurred_at: DateTime<Utc>,
    ) -> i64 {
        self.add_user(user_id);
        let mut inner = self.inner.lock().unwrap();
        let id = inner.transactions.len() as i64 + 1;
        inner.transactions.push(Transaction {
            id,
            user_id,
            category_id: Some(category_id),
            category_name: Some(category_name.to_string()),
            amount,
            kind: TransactionKind::Expense,
            description: Some(format!("{} purchase", category_name)),
            occurred_at,
        });
        id
    }

    pub fn add_budget(&self, budget: Budget) {
        self.add_user(budget.user_id);
        self.inner.lock().unwrap().budgets.push(budget);
    }

    pub fn add_goal(&self, goal: Goal) {
        self.add_user(goal.user_id);
        self.inner.lock().unwrap().goals.push(goal);
    }

    pub fn set_preferences(&self, user_id: i64, prefs: NotificationPreferences) {
        self.inner
            .lock()
            .unwrap()
            .preferences
            .insert(user_id, prefs);
    }

    /// Every persisted notification, oldest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.inner.lock().unwrap().notifications.clone()
    }

    pub fn notifications_for(&self, user_id: i64) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn analyses(&self) -> Vec<DetectionResult> {
        self.inner.lock().unwrap().analyses.clone()
    }

    pub fn fail_notification_reads(&self, fail: bool) {
        self.fail_notification_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_notification_writes(&self, fail: bool) {
        self.fail_notification_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_preferences(&self, fail: bool) {
        self.fail_preferences.store(fail, Ordering::SeqCst);
    }

    /// Make every ledger read for `user_id` fail
    pub fn fail_ledger_for_user(&self, user_id: i64) {
        self.failing_ledgers.lock().unwrap().insert(user_id);
    }

    fn check_ledger(&self, user_id: i64) -> Result<()> {
        if self.failing_ledgers.lock().unwrap().contains(&user_id) {
            return Err(Error::Store(format!("ledger unavailable for user {}", user_id)));
        }
        Ok(())
    }
}

impl LedgerStore for MemoryStore {
    fn list_user_ids(&self) -> Result<Vec<i64>> {
        let mut users = self.inner.lock().unwrap().users.clone();
        users.sort_unstable();
        Ok(users)
    }

    fn list_expenses(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Transaction>> {
        self.check_ledger(user_id)?;
        let mut txs: Vec<Transaction> = self
            .inner
            .lock()
            .unwrap()
            .transactions
            .iter()
            .filter(|tx| {
                tx.user_id == user_id
                    && tx.kind == TransactionKind::Expense
                    && tx.occurred_at >= start
                    && tx.occurred_at <= end
            })
            .cloned()
            .collect();
        txs.sort_by_key(|tx| (tx.occurred_at, tx.id));
        Ok(txs)
    }

    fn list_active_budgets(&self, user_id: i64, _now: DateTime<Utc>) -> Result<Vec<Budget>> {
        self.check_ledger(user_id)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .budgets
            .iter()
            .filter(|b| b.user_id == user_id && b.is_active)
            .cloned()
            .collect())
    }

    fn list_open_goals(&self, user_id: i64) -> Result<Vec<Goal>> {
        self.check_ledger(user_id)?;
        Ok(self
            .inner
            .lock()
            .unwrap()
            .goals
            .iter()
            .filter(|g| g.user_id == user_id && !g.is_achieved)
            .cloned()
            .collect())
    }

    fn mark_goal_achieved(&self, goal_id: i64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.goals.iter_mut().find(|g| g.id == goal_id) {
            Some(goal) => {
                goal.is_achieved = true;
                Ok(())
            }
            None => Err(Error::NotFound(format!("goal {}", goal_id))),
        }
    }
}

impl NotificationLog for MemoryStore {
    fn create_notification(&self, notification: &NewNotification) -> Result<i64> {
        if self.fail_notification_writes.load(Ordering::SeqCst) {
            return Err(Error::Store("notification insert failed".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let id = inner.notifications.len() as i64 + 1;
        inner.notifications.push(Notification {
            id,
            user_id: notification.user_id,
            kind: notification.kind,
            notification_type: notification.notification_type,
            priority: notification.priority,
            title: notification.title.clone(),
            message: notification.message.clone(),
            subject_key: notification.subject_key.clone(),
            metadata: notification.metadata.clone(),
            is_read: false,
            created_at: notification.created_at,
        });
        Ok(id)
    }

    fn find_recent(
        &self,
        user_id: i64,
        kind: AlertKind,
        subject: &SubjectKey,
        since: DateTime<Utc>,
    ) -> Result<Option<Notification>> {
        if self.fail_notification_reads.load(Ordering::SeqCst) {
            return Err(Error::Store("notification lookup failed".to_string()));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .notifications
            .iter()
            .rev()
            .find(|n| {
                n.user_id == user_id
                    && n.kind == kind
                    && n.subject_key.as_ref() == Some(subject)
                    && n.created_at > since
            })
            .cloned())
    }
}

impl PreferencesStore for MemoryStore {
    fn get_preferences(&self, user_id: i64) -> Result<NotificationPreferences> {
        if self.fail_preferences.load(Ordering::SeqCst) {
            return Err(Error::Store("preferences unavailable".to_string()));
        }
        Ok(self
            .inner
            .lock()
            .unwrap()
            .preferences
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }
}

impl AnalysisLog for MemoryStore {
    fn record_analysis(&self, result: &DetectionResult) -> Result<i64> {
        let mut inner = self.inner.lock().unwrap();
        inner.analyses.push(result.clone());
        Ok(inner.analyses.len() as i64)
    }
}
