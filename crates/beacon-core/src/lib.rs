//! Beacon Core Library
//!
//! Anomaly detection and alert dispatch for the Beacon finance tracker:
//! - Robust statistics (median/MAD z-scores) and seasonal baselines
//! - Anomaly detection over a user's expenses
//! - Budget pacing and goal progress checks
//! - Alert dispatch with preference filtering, lookback dedup and
//!   bounded asynchronous channel fan-out
//! - Periodic sweep over all users
//! - SQLite/SQLCipher persistence for the ledger and notification log

pub mod config;
pub mod db;
pub mod detect;
pub mod error;
pub mod goals;
pub mod models;
pub mod notify;
pub mod pacing;
pub mod stats;
pub mod store;
pub mod sweep;

/// In-memory stores and recording channels for tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::AlertConfig;
pub use db::Database;
pub use detect::{Anomaly, AnomalyDetector, AnomalyKind, DetectionConfig, DetectionResult};
pub use error::{Error, Result};
pub use goals::{GoalProjection, GoalRules};
pub use notify::{
    AlertDispatcher, ChannelTransport, DedupGate, DeliveryStatsSnapshot, DispatchOutcome,
    FanoutConfig, FanoutQueue, SuppressReason,
};
pub use pacing::{BudgetPace, BudgetPacer, BudgetPacing};
pub use stats::{CategoryStats, RobustStats};
pub use store::{AnalysisLog, LedgerStore, NotificationLog, PreferencesStore};
pub use sweep::{AlertSweeper, SweepConfig, SweepReport};
