//! Domain models for Beacon

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A ledger owner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A spending category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
}

/// Direction of money movement for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    Expense,
    Transfer,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
            Self::Transfer => "transfer",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "expense" => Ok(Self::Expense),
            "transfer" => Ok(Self::Transfer),
            _ => Err(format!("Unknown transaction kind: {}", s)),
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A ledger transaction. Amounts are always positive; `kind` carries direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    /// Category display name (joined from categories)
    pub category_name: Option<String>,
    pub amount: f64,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Data for recording a new transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub amount: f64,
    pub kind: TransactionKind,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Budget period length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Custom => "custom",
        }
    }
}

impl std::str::FromStr for BudgetPeriod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            "custom" => Ok(Self::Custom),
            _ => Err(format!("Unknown budget period: {}", s)),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Default alert threshold percentage for budgets
pub const DEFAULT_ALERT_THRESHOLD: f64 = 80.0;

/// A spending budget over a fixed window.
///
/// Spent, remaining and usage are never stored; they are recomputed from the
/// ledger on every read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// None means the budget covers all categories
    pub category_id: Option<i64>,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Usage percentage at which a threshold alert fires
    pub alert_threshold: f64,
    pub is_active: bool,
}

impl Budget {
    /// Whether `now` falls inside the budget window (inclusive)
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_date && now <= self.end_date
    }

    /// Whether an expense counts against this budget
    pub fn matches(&self, tx: &Transaction) -> bool {
        tx.kind == TransactionKind::Expense
            && tx.user_id == self.user_id
            && tx.occurred_at >= self.start_date
            && tx.occurred_at <= self.end_date
            && match self.category_id {
                Some(cat) => tx.category_id == Some(cat),
                None => true,
            }
    }
}

/// Data for creating a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBudget {
    pub user_id: i64,
    pub name: String,
    pub category_id: Option<i64>,
    pub amount: f64,
    pub period: BudgetPeriod,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub alert_threshold: Option<f64>,
}

/// A savings goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: Option<DateTime<Utc>>,
    pub is_achieved: bool,
}

impl Goal {
    /// Progress toward the target as a percentage (0 when target ≤ 0)
    pub fn progress_pct(&self) -> f64 {
        if self.target_amount > 0.0 {
            self.current_amount / self.target_amount * 100.0
        } else {
            0.0
        }
    }
}

/// Data for creating a goal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGoal {
    pub user_id: i64,
    pub title: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: Option<DateTime<Utc>>,
}

/// Presentation type of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Info,
    Warning,
    Success,
    Error,
    Reminder,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Success => "success",
            Self::Error => "error",
            Self::Reminder => "reminder",
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "success" => Ok(Self::Success),
            "error" => Ok(Self::Error),
            "reminder" => Ok(Self::Reminder),
            _ => Err(format!("Unknown notification type: {}", s)),
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification priority, ordered from least to most pressing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Urgent => "urgent",
        }
    }

    /// High and urgent alerts must never be dropped silently
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "urgent" => Ok(Self::Urgent),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Feature area a notification belongs to (each has a user toggle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Budget,
    Goal,
    Anomaly,
    /// Spending insights outside the anomaly detector (large expenses)
    Analytics,
}

/// What an alert is about. Fixes type, priority, feature and dedup scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    BudgetThreshold,
    BudgetExceeded,
    BudgetPacing,
    GoalDeadline,
    GoalMilestone,
    GoalAchieved,
    Anomaly,
    LargeTransaction,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BudgetThreshold => "budget_threshold",
            Self::BudgetExceeded => "budget_exceeded",
            Self::BudgetPacing => "budget_pacing",
            Self::GoalDeadline => "goal_deadline",
            Self::GoalMilestone => "goal_milestone",
            Self::GoalAchieved => "goal_achieved",
            Self::Anomaly => "anomaly",
            Self::LargeTransaction => "large_transaction",
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            Self::GoalMilestone => NotificationType::Info,
            Self::GoalAchieved => NotificationType::Success,
            _ => NotificationType::Warning,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::BudgetExceeded => Priority::Urgent,
            Self::BudgetPacing | Self::GoalMilestone | Self::LargeTransaction => Priority::Medium,
            Self::BudgetThreshold | Self::GoalDeadline | Self::GoalAchieved | Self::Anomaly => {
                Priority::High
            }
        }
    }

    pub fn feature(&self) -> Feature {
        match self {
            Self::BudgetThreshold | Self::BudgetExceeded | Self::BudgetPacing => Feature::Budget,
            Self::GoalDeadline | Self::GoalMilestone | Self::GoalAchieved => Feature::Goal,
            Self::Anomaly => Feature::Anomaly,
            Self::LargeTransaction => Feature::Analytics,
        }
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "budget_threshold" => Ok(Self::BudgetThreshold),
            "budget_exceeded" => Ok(Self::BudgetExceeded),
            "budget_pacing" => Ok(Self::BudgetPacing),
            "goal_deadline" => Ok(Self::GoalDeadline),
            "goal_milestone" => Ok(Self::GoalMilestone),
            "goal_achieved" => Ok(Self::GoalAchieved),
            "anomaly" => Ok(Self::Anomaly),
            "large_transaction" => Ok(Self::LargeTransaction),
            _ => Err(format!("Unknown alert kind: {}", s)),
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Bot,
    InApp,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Bot => "bot",
            Self::InApp => "in_app",
        }
    }

    /// External channels leave the process; in-app is the persisted record
    pub fn is_external(&self) -> bool {
        !matches!(self, Self::InApp)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Exact dedup key identifying what an alert is about (e.g. `budget:12`).
///
/// Stored in its own indexed column so lookups are exact matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn budget(budget_id: i64) -> Self {
        Self(format!("budget:{}", budget_id))
    }

    pub fn goal(goal_id: i64) -> Self {
        Self(format!("goal:{}", goal_id))
    }

    pub fn goal_milestone(goal_id: i64, milestone: u32) -> Self {
        Self(format!("goal:{}:milestone:{}", goal_id, milestone))
    }

    pub fn transaction(transaction_id: i64) -> Self {
        Self(format!("transaction:{}", transaction_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SubjectKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A candidate alert on its way through the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTrigger {
    pub user_id: i64,
    pub kind: AlertKind,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    /// Dedup key; triggers without one are never deduplicated
    pub subject: Option<SubjectKey>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl NotificationTrigger {
    /// Build a trigger with the kind's default type and priority
    pub fn new(
        user_id: i64,
        kind: AlertKind,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            notification_type: kind.notification_type(),
            priority: kind.priority(),
            title: title.into(),
            message: message.into(),
            subject: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_subject(mut self, subject: SubjectKey) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A persisted notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub kind: AlertKind,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub subject_key: Option<SubjectKey>,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Data for persisting a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: i64,
    pub kind: AlertKind,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub title: String,
    pub message: String,
    pub subject_key: Option<SubjectKey>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl NewNotification {
    pub fn from_trigger(trigger: &NotificationTrigger, created_at: DateTime<Utc>) -> Self {
        let metadata = serde_json::Value::Object(
            trigger
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        Self {
            user_id: trigger.user_id,
            kind: trigger.kind,
            notification_type: trigger.notification_type,
            priority: trigger.priority,
            title: trigger.title.clone(),
            message: trigger.message.clone(),
            subject_key: trigger.subject.clone(),
            metadata,
            created_at,
        }
    }
}

/// Per-user notification settings.
///
/// A user with no stored document gets `NotificationPreferences::default()`,
/// which enables everything. Partial documents fill missing fields from the
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPreferences {
    // Channels
    pub email_enabled: bool,
    pub bot_enabled: bool,
    pub in_app_enabled: bool,

    // Features
    pub budget_alerts: bool,
    pub goal_alerts: bool,
    pub anomaly_alerts: bool,
    pub analytics_alerts: bool,

    // Priorities
    pub urgent_notifications: bool,
    pub high_notifications: bool,
    pub medium_notifications: bool,
    pub low_notifications: bool,

    /// Quiet hours in UTC, `HH:MM`. The window may wrap midnight.
    pub quiet_hours_start: Option<String>,
    pub quiet_hours_end: Option<String>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_enabled: true,
            bot_enabled: true,
            in_app_enabled: true,
            budget_alerts: true,
            goal_alerts: true,
            anomaly_alerts: true,
            analytics_alerts: true,
            urgent_notifications: true,
            high_notifications: true,
            medium_notifications: true,
            low_notifications: true,
            quiet_hours_start: None,
            quiet_hours_end: None,
        }
    }
}

impl NotificationPreferences {
    pub fn channel_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Bot => self.bot_enabled,
            Channel::InApp => self.in_app_enabled,
        }
    }

    pub fn feature_enabled(&self, feature: Feature) -> bool {
        match feature {
            Feature::Budget => self.budget_alerts,
            Feature::Goal => self.goal_alerts,
            Feature::Anomaly => self.anomaly_alerts,
            Feature::Analytics => self.analytics_alerts,
        }
    }

    pub fn priority_enabled(&self, priority: Priority) -> bool {
        match priority {
            Priority::Urgent => self.urgent_notifications,
            Priority::High => self.high_notifications,
            Priority::Medium => self.medium_notifications,
            Priority::Low => self.low_notifications,
        }
    }

    /// Check that quiet hours, when set, are both present and `HH:MM`
    pub fn validate(&self) -> Result<()> {
        match (&self.quiet_hours_start, &self.quiet_hours_end) {
            (None, None) => Ok(()),
            (Some(start), Some(end)) => {
                parse_hhmm(start)?;
                parse_hhmm(end)?;
                Ok(())
            }
            _ => Err(Error::InvalidData(
                "quiet hours need both a start and an end".to_string(),
            )),
        }
    }

    /// Whether `now` falls inside the configured quiet hours
    pub fn in_quiet_hours(&self, now: DateTime<Utc>) -> bool {
        let (Some(start), Some(end)) = (&self.quiet_hours_start, &self.quiet_hours_end) else {
            return false;
        };
        let (Ok(start), Ok(end)) = (parse_hhmm(start), parse_hhmm(end)) else {
            return false;
        };
        let current = NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(start);

        if start == end {
            false
        } else if start < end {
            current >= start && current < end
        } else {
            // Wraps midnight, e.g. 22:00 - 08:00
            current >= start || current < end
        }
    }
}

fn parse_hhmm(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| Error::InvalidData(format!("Invalid time '{}', expected HH:MM", s)))
}

/// A stored analysis run (audit trail for detection runs)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub user_id: i64,
    pub analysis_type: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub threshold: f64,
    pub score: f64,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
