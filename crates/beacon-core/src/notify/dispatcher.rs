//! Alert dispatcher
//!
//! Every candidate alert, whether raised inline by a write or by the periodic
//! sweep, goes through `AlertDispatcher`. The record is persisted before any
//! channel sees it; a failed insert aborts the dispatch and nothing is sent.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::detect::Anomaly;
use crate::error::Result;
use crate::models::{
    Channel, NewNotification, Notification, NotificationPreferences, NotificationTrigger, Priority,
};
use crate::store::{NotificationLog, PreferencesStore};

use super::dedup::{DedupGate, DedupWindows};
use super::fanout::{Delivery, FanoutQueue};
use super::policy::{self, AnomalyAlertPolicy};
use super::render::{PlainTextRenderer, Renderer};
use super::triggers;

/// Delivery order when fanning out
const CHANNEL_ORDER: [Channel; 3] = [Channel::InApp, Channel::Email, Channel::Bot];

/// Why a trigger did not produce a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SuppressReason {
    /// The user's preferences exclude it
    Preferences,
    /// Preferences could not be loaded and the alert is not critical
    PreferencesUnavailable,
    /// An equivalent alert went out inside the lookback window
    Duplicate { existing_id: i64 },
}

/// Terminal state of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchOutcome {
    Suppressed {
        reason: SuppressReason,
    },
    /// Persisted and handed to every selected channel
    FannedOut {
        notification_id: i64,
        channels: Vec<Channel>,
    },
    /// Persisted, but the fan-out queue refused some channels
    PartiallyFailed {
        notification_id: i64,
        delivered: Vec<Channel>,
        dropped: Vec<Channel>,
    },
}

impl DispatchOutcome {
    pub fn notification_id(&self) -> Option<i64> {
        match self {
            Self::Suppressed { .. } => None,
            Self::FannedOut {
                notification_id, ..
            }
            | Self::PartiallyFailed {
                notification_id, ..
            } => Some(*notification_id),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed { .. })
    }
}

/// Preference filter, dedup, persistence and fan-out for every alert
pub struct AlertDispatcher {
    log: Arc<dyn NotificationLog>,
    prefs: Arc<dyn PreferencesStore>,
    gate: DedupGate,
    fanout: FanoutQueue,
    renderer: Arc<dyn Renderer>,
    anomaly_policy: AnomalyAlertPolicy,
}

impl AlertDispatcher {
    pub fn new(
        log: Arc<dyn NotificationLog>,
        prefs: Arc<dyn PreferencesStore>,
        fanout: FanoutQueue,
    ) -> Self {
        Self {
            gate: DedupGate::new(log.clone()),
            log,
            prefs,
            fanout,
            renderer: Arc::new(PlainTextRenderer),
            anomaly_policy: AnomalyAlertPolicy::default(),
        }
    }

    pub fn with_dedup_windows(mut self, windows: DedupWindows) -> Self {
        self.gate = DedupGate::with_windows(self.log.clone(), windows);
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_anomaly_policy(mut self, policy: AnomalyAlertPolicy) -> Self {
        self.anomaly_policy = policy;
        self
    }

    pub fn fanout(&self) -> &FanoutQueue {
        &self.fanout
    }

    pub fn anomaly_policy(&self) -> &AnomalyAlertPolicy {
        &self.anomaly_policy
    }

    pub fn dispatch(&self, trigger: NotificationTrigger) -> Result<DispatchOutcome> {
        self.dispatch_at(trigger, Utc::now())
    }

    /// Dispatch with an explicit clock
    pub fn dispatch_at(
        &self,
        trigger: NotificationTrigger,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome> {
        let user_id = trigger.user_id;
        let kind = trigger.kind.as_str();

        let prefs = match self.prefs.get_preferences(user_id) {
            Ok(prefs) => {
                if !policy::preference_allows(&prefs, &trigger) {
                    debug!(user_id, kind, "Alert suppressed by preferences");
                    return Ok(DispatchOutcome::Suppressed {
                        reason: SuppressReason::Preferences,
                    });
                }
                prefs
            }
            Err(e) => {
                if !policy::allows_without_preferences(&trigger) {
                    warn!(user_id, kind, error = %e, "Preferences unavailable, alert held back");
                    return Ok(DispatchOutcome::Suppressed {
                        reason: SuppressReason::PreferencesUnavailable,
                    });
                }
                warn!(user_id, kind, error = %e, "Preferences unavailable, using defaults");
                NotificationPreferences::default()
            }
        };

        if let Some(subject) = &trigger.subject {
            if let Some(existing_id) =
                self.gate
                    .find_duplicate_for_kind(user_id, trigger.kind, subject, now)
            {
                return Ok(DispatchOutcome::Suppressed {
                    reason: SuppressReason::Duplicate { existing_id },
                });
            }
        }

        let record = NewNotification::from_trigger(&trigger, now);
        let notification_id = self.log.create_notification(&record)?;
        let notification = Notification {
            id: notification_id,
            user_id,
            kind: record.kind,
            notification_type: record.notification_type,
            priority: record.priority,
            title: record.title,
            message: record.message,
            subject_key: record.subject_key,
            metadata: record.metadata,
            is_read: false,
            created_at: now,
        };

        let (delivered, dropped) = self.fan_out(&notification, &prefs, now);

        debug!(
            user_id,
            kind,
            notification_id,
            delivered = delivered.len(),
            dropped = dropped.len(),
            "Alert dispatched"
        );

        if dropped.is_empty() {
            Ok(DispatchOutcome::FannedOut {
                notification_id,
                channels: delivered,
            })
        } else {
            Ok(DispatchOutcome::PartiallyFailed {
                notification_id,
                delivered,
                dropped,
            })
        }
    }

    /// Alert on the strongest anomalies from one detection run
    pub fn dispatch_anomalies(
        &self,
        user_id: i64,
        anomalies: &[Anomaly],
        caller_threshold: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<DispatchOutcome>> {
        policy::select_anomalies(anomalies, caller_threshold, &self.anomaly_policy)
            .iter()
            .map(|anomaly| self.dispatch_at(triggers::anomaly(user_id, anomaly), now))
            .collect()
    }

    fn fan_out(
        &self,
        notification: &Notification,
        prefs: &NotificationPreferences,
        now: DateTime<Utc>,
    ) -> (Vec<Channel>, Vec<Channel>) {
        let quiet = notification.priority != Priority::Urgent && prefs.in_quiet_hours(now);
        let mut delivered = Vec::new();
        let mut dropped = Vec::new();

        for channel in CHANNEL_ORDER {
            if !prefs.channel_enabled(channel) || !self.fanout.has_channel(channel) {
                continue;
            }
            if quiet && channel.is_external() {
                debug!(
                    notification_id = notification.id,
                    channel = channel.as_str(),
                    "Quiet hours, skipping channel"
                );
                continue;
            }

            let delivery = Delivery {
                user_id: notification.user_id,
                channel,
                message: self.renderer.render(notification, channel),
            };
            if self.fanout.enqueue(delivery) {
                delivered.push(channel);
            } else {
                dropped.push(channel);
            }
        }

        (delivered, dropped)
    }
}
