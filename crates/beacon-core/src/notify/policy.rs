//! Preference filtering and anomaly alert selection

use std::collections::HashSet;

use crate::detect::Anomaly;
use crate::models::{NotificationPreferences, NotificationTrigger, NotificationType, Priority};

/// Whether user preferences let this trigger through.
///
/// High and urgent warnings always pass. Everything else needs both its
/// feature toggle and its priority toggle enabled.
pub fn preference_allows(prefs: &NotificationPreferences, trigger: &NotificationTrigger) -> bool {
    if trigger.notification_type == NotificationType::Warning && trigger.priority.is_critical() {
        return true;
    }
    prefs.feature_enabled(trigger.kind.feature()) && prefs.priority_enabled(trigger.priority)
}

/// Decision when preferences could not be loaded: critical alerts are
/// evaluated against defaults, everything else is held back.
pub fn allows_without_preferences(trigger: &NotificationTrigger) -> bool {
    match trigger.priority {
        Priority::Urgent | Priority::High => {
            preference_allows(&NotificationPreferences::default(), trigger)
        }
        Priority::Medium | Priority::Low => false,
    }
}

/// Limits on how many anomaly alerts one run may produce
#[derive(Debug, Clone)]
pub struct AnomalyAlertPolicy {
    /// Floor for the caller's score threshold
    pub min_score: f64,
    /// Maximum alerts per run
    pub max_per_run: usize,
}

impl Default for AnomalyAlertPolicy {
    fn default() -> Self {
        Self {
            min_score: 0.8,
            max_per_run: 3,
        }
    }
}

/// Pick the anomalies worth alerting on: score at least
/// `max(caller_threshold, min_score)`, highest first, one per transaction,
/// capped at `max_per_run`.
pub fn select_anomalies(
    anomalies: &[Anomaly],
    caller_threshold: f64,
    policy: &AnomalyAlertPolicy,
) -> Vec<Anomaly> {
    let floor = caller_threshold.max(policy.min_score);

    let mut eligible: Vec<&Anomaly> = anomalies.iter().filter(|a| a.score >= floor).collect();
    eligible.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.transaction_id.cmp(&b.transaction_id))
    });

    let mut seen = HashSet::new();
    eligible
        .into_iter()
        .filter(|a| seen.insert(a.transaction_id))
        .take(policy.max_per_run)
        .cloned()
        .collect()
}
