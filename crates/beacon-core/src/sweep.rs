//! Periodic alert sweep
//!
//! Visits every user in turn: anomaly detection over a rolling window,
//! budget checks and goal checks, all routed through the dispatcher. A
//! failure for one user is logged and the sweep moves on to the next.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::detect::{AnomalyDetector, DetectionConfig};
use crate::error::Result;
use crate::goals::{self, GoalRules};
use crate::models::{Transaction, TransactionKind};
use crate::notify::{triggers, AlertDispatcher, DispatchOutcome};
use crate::pacing::BudgetPacer;
use crate::store::{AnalysisLog, LedgerStore};

/// Sweep settings
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Rolling anomaly detection window
    pub anomaly_window_days: i64,
    /// Score threshold handed to the anomaly alert filter
    pub anomaly_alert_score: f64,
    /// Expenses above this amount raise an inline alert; 0 disables
    pub large_transaction_amount: f64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            anomaly_window_days: 30,
            anomaly_alert_score: 0.9,
            large_transaction_amount: 1_000_000.0,
        }
    }
}

/// Totals for one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub users_total: usize,
    pub users_processed: usize,
    pub users_failed: usize,
    pub alerts_sent: usize,
    pub alerts_suppressed: usize,
    pub anomalies_found: usize,
    /// Stopped early by a shutdown signal
    pub interrupted: bool,
}

impl SweepReport {
    fn tally(&mut self, outcomes: &[DispatchOutcome]) {
        for outcome in outcomes {
            if outcome.is_suppressed() {
                self.alerts_suppressed += 1;
            } else {
                self.alerts_sent += 1;
            }
        }
    }
}

/// Runs the periodic checks for every user
pub struct AlertSweeper {
    ledger: Arc<dyn LedgerStore>,
    dispatcher: Arc<AlertDispatcher>,
    analysis: Option<Arc<dyn AnalysisLog>>,
    detection: DetectionConfig,
    goals: GoalRules,
    config: SweepConfig,
}

impl AlertSweeper {
    pub fn new(ledger: Arc<dyn LedgerStore>, dispatcher: Arc<AlertDispatcher>) -> Self {
        Self {
            ledger,
            dispatcher,
            analysis: None,
            detection: DetectionConfig::default(),
            goals: GoalRules::default(),
            config: SweepConfig::default(),
        }
    }

    /// Record each detection run
    pub fn with_analysis_log(mut self, analysis: Arc<dyn AnalysisLog>) -> Self {
        self.analysis = Some(analysis);
        self
    }

    pub fn with_detection(mut self, detection: DetectionConfig) -> Self {
        self.detection = detection;
        self
    }

    pub fn with_goal_rules(mut self, goals: GoalRules) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dispatcher(&self) -> &Arc<AlertDispatcher> {
        &self.dispatcher
    }

    /// Sweep every user once
    pub fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let (_tx, rx) = watch::channel(false);
        self.run_with_shutdown(now, &rx)
    }

    /// Sweep every user, stopping between users once `shutdown` reads true.
    ///
    /// Only the user listing can fail the whole sweep.
    pub fn run_with_shutdown(
        &self,
        now: DateTime<Utc>,
        shutdown: &watch::Receiver<bool>,
    ) -> Result<SweepReport> {
        let users = self.ledger.list_user_ids()?;
        let mut report = SweepReport {
            users_total: users.len(),
            ..Default::default()
        };

        info!(users = users.len(), "Starting alert sweep");

        for user_id in users {
            if *shutdown.borrow() {
                warn!(
                    processed = report.users_processed,
                    "Alert sweep interrupted by shutdown"
                );
                report.interrupted = true;
                break;
            }

            match self.process_user(user_id, now, &mut report) {
                Ok(()) => report.users_processed += 1,
                Err(e) => {
                    report.users_failed += 1;
                    error!(user_id, error = %e, "Alert sweep failed for user");
                }
            }
        }

        info!(
            processed = report.users_processed,
            failed = report.users_failed,
            sent = report.alerts_sent,
            suppressed = report.alerts_suppressed,
            "Alert sweep complete"
        );
        Ok(report)
    }

    fn process_user(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<()> {
        let outcomes = self.check_anomalies(user_id, now, report)?;
        report.tally(&outcomes);

        let outcomes = self.check_budgets(user_id, now)?;
        report.tally(&outcomes);

        let outcomes = self.check_goals(user_id, now)?;
        report.tally(&outcomes);

        debug!(user_id, "User swept");
        Ok(())
    }

    fn check_anomalies(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) -> Result<Vec<DispatchOutcome>> {
        let start = now - Duration::days(self.config.anomaly_window_days);
        let detector = AnomalyDetector::with_config(self.ledger.as_ref(), self.detection.clone());
        let result = detector.detect(user_id, start, now, self.detection.threshold)?;
        report.anomalies_found += result.anomalies.len();

        if let Some(analysis) = &self.analysis {
            if let Err(e) = analysis.record_analysis(&result) {
                warn!(user_id, error = %e, "Failed to record anomaly analysis");
            }
        }

        self.dispatcher.dispatch_anomalies(
            user_id,
            &result.anomalies,
            self.config.anomaly_alert_score,
            now,
        )
    }

    /// Threshold, exceeded and pacing alerts for every in-window budget.
    ///
    /// Also used inline after a transaction is recorded.
    pub fn check_budgets(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<DispatchOutcome>> {
        let pacing = BudgetPacer::new(self.ledger.as_ref()).pacing(user_id, now)?;
        triggers::budget_alerts(&pacing)
            .into_iter()
            .map(|trigger| self.dispatcher.dispatch_at(trigger, now))
            .collect()
    }

    /// Inline checks after a transaction write: the large-expense alert,
    /// then the budget checks. Income and transfers raise nothing.
    pub fn check_transaction(
        &self,
        tx: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<Vec<DispatchOutcome>> {
        if tx.kind != TransactionKind::Expense {
            return Ok(Vec::new());
        }

        let mut outcomes = Vec::new();
        let limit = self.config.large_transaction_amount;
        if limit > 0.0 && tx.amount > limit {
            let trigger = triggers::large_transaction(tx, limit);
            outcomes.push(self.dispatcher.dispatch_at(trigger, now)?);
        }
        outcomes.extend(self.check_budgets(tx.user_id, now)?);
        Ok(outcomes)
    }

    /// Deadline, milestone and achievement alerts for open goals
    pub fn check_goals(&self, user_id: i64, now: DateTime<Utc>) -> Result<Vec<DispatchOutcome>> {
        let mut outcomes = Vec::new();
        for goal in self.ledger.list_open_goals(user_id)? {
            for trigger in triggers::goal_alerts(&goal, now, &self.goals) {
                outcomes.push(self.dispatcher.dispatch_at(trigger, now)?);
            }
            if goals::newly_achieved(&goal) {
                self.ledger.mark_goal_achieved(goal.id)?;
            }
        }
        Ok(outcomes)
    }
}
