//! Alert configuration
//!
//! Loaded from TOML. Lookup order: explicit path, `BEACON_ALERT_CONFIG`,
//! the platform config dir, then the embedded default. Webhook URLs can be
//! overridden from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::detect::DetectionConfig;
use crate::error::{Error, Result};
use crate::goals::GoalRules;
use crate::models::Channel;
use crate::notify::{
    AnomalyAlertPolicy, ChannelTransport, DedupWindows, FanoutConfig, LogChannel, WebhookChannel,
};
use crate::sweep::SweepConfig;

/// Embedded default configuration
const DEFAULT_CONFIG: &str = include_str!("../../../config/alerts.toml");

/// Environment variable naming a config file
pub const CONFIG_PATH_ENV: &str = "BEACON_ALERT_CONFIG";
pub const EMAIL_WEBHOOK_ENV: &str = "BEACON_EMAIL_WEBHOOK";
pub const BOT_WEBHOOK_ENV: &str = "BEACON_BOT_WEBHOOK";

/// Bridge endpoints for external channels
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelConfig {
    pub email_webhook: Option<String>,
    pub bot_webhook: Option<String>,
}

/// Everything tunable about detection and dispatch
#[derive(Debug, Clone, Default)]
pub struct AlertConfig {
    pub detection: DetectionConfig,
    pub anomaly_policy: AnomalyAlertPolicy,
    pub sweep: SweepConfig,
    pub dedup: DedupWindows,
    pub fanout: FanoutConfig,
    pub goals: GoalRules,
    pub channels: ChannelConfig,
}

impl AlertConfig {
    /// Load with the standard lookup order and environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = load_config(path)?;
        config.apply_env(|var| std::env::var(var).ok());
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        if let Some(url) = non_empty(EMAIL_WEBHOOK_ENV) {
            self.channels.email_webhook = Some(url);
        }
        if let Some(url) = non_empty(BOT_WEBHOOK_ENV) {
            self.channels.bot_webhook = Some(url);
        }
    }

    /// Transports for the configured channels.
    ///
    /// External channels get a webhook transport when a URL is configured.
    /// In-app delivery is the persisted record; its transport only logs.
    pub fn transports(&self) -> Vec<Arc<dyn ChannelTransport>> {
        let mut transports: Vec<Arc<dyn ChannelTransport>> =
            vec![Arc::new(LogChannel::new(Channel::InApp))];

        let timeout = self.fanout.send_timeout;
        if let Some(url) = &self.channels.email_webhook {
            transports.push(Arc::new(WebhookChannel::with_timeout(
                Channel::Email,
                url,
                timeout,
            )));
        }
        if let Some(url) = &self.channels.bot_webhook {
            transports.push(Arc::new(WebhookChannel::with_timeout(
                Channel::Bot,
                url,
                timeout,
            )));
        }

        info!(
            email = self.channels.email_webhook.is_some(),
            bot = self.channels.bot_webhook.is_some(),
            "Configured notification channels"
        );
        transports
    }
}

/// Per-user override location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("beacon").join("alerts.toml"))
}

fn read_config(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config {}: {}", path.display(), e))
    })
}

fn load_config(override_path: Option<&Path>) -> Result<AlertConfig> {
    // An explicit path must exist
    if let Some(path) = override_path {
        debug!(path = %path.display(), "Loading alert config");
        return parse_config(&read_config(path)?);
    }

    if let Some(path) = std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
    {
        debug!(path = %path, "Loading alert config from environment");
        return parse_config(&read_config(Path::new(&path))?);
    }

    if let Some(path) = default_config_path().filter(|p| p.exists()) {
        debug!(path = %path.display(), "Loading alert config");
        return parse_config(&read_config(&path)?);
    }

    parse_config(DEFAULT_CONFIG)
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    detection: Option<RawDetection>,
    dispatch: Option<RawDispatch>,
    dedup: Option<RawDedup>,
    fanout: Option<RawFanout>,
    goals: Option<RawGoals>,
    channels: Option<RawChannels>,
}

#[derive(Debug, Deserialize)]
struct RawDetection {
    threshold: Option<f64>,
    local_min_samples: Option<usize>,
    seasonal_min_samples: Option<usize>,
    window_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawDispatch {
    min_anomaly_score: Option<f64>,
    max_anomalies_per_run: Option<usize>,
    sweep_anomaly_score: Option<f64>,
    large_transaction_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawDedup {
    budget_hours: Option<i64>,
    goal_hours: Option<i64>,
    anomaly_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawFanout {
    queue_capacity: Option<usize>,
    max_concurrency: Option<usize>,
    send_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawGoals {
    deadline_days: Option<i64>,
    monthly_savings_rate: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawChannels {
    email_webhook: Option<String>,
    bot_webhook: Option<String>,
}

/// Positive, representable windows only; anything else keeps the default
fn dedup_window(hours: Option<i64>) -> Option<chrono::Duration> {
    hours
        .filter(|h| *h > 0)
        .and_then(chrono::Duration::try_hours)
}

fn parse_config(content: &str) -> Result<AlertConfig> {
    let raw: RawConfig = toml::from_str(content)?;
    let mut config = AlertConfig::default();

    if let Some(detection) = raw.detection {
        if let Some(threshold) = detection.threshold.filter(|t| *t > 0.0) {
            config.detection.threshold = threshold;
        }
        if let Some(n) = detection.local_min_samples {
            config.detection.local_min_samples = n;
        }
        if let Some(n) = detection.seasonal_min_samples {
            config.detection.seasonal_min_samples = n;
        }
        if let Some(days) = detection.window_days.filter(|d| *d > 0) {
            config.sweep.anomaly_window_days = days;
        }
    }

    if let Some(dispatch) = raw.dispatch {
        if let Some(score) = dispatch.min_anomaly_score {
            config.anomaly_policy.min_score = score.clamp(0.0, 1.0);
        }
        if let Some(max) = dispatch.max_anomalies_per_run {
            config.anomaly_policy.max_per_run = max;
        }
        if let Some(score) = dispatch.sweep_anomaly_score {
            config.sweep.anomaly_alert_score = score.clamp(0.0, 1.0);
        }
        if let Some(amount) = dispatch.large_transaction_amount {
            config.sweep.large_transaction_amount = amount.max(0.0);
        }
    }

    if let Some(dedup) = raw.dedup {
        if let Some(window) = dedup_window(dedup.budget_hours) {
            config.dedup.budget = window;
        }
        if let Some(window) = dedup_window(dedup.goal_hours) {
            config.dedup.goal = window;
        }
        if let Some(window) = dedup_window(dedup.anomaly_hours) {
            config.dedup.anomaly = window;
        }
    }

    if let Some(fanout) = raw.fanout {
        if let Some(capacity) = fanout.queue_capacity {
            config.fanout.queue_capacity = capacity.max(1);
        }
        if let Some(concurrency) = fanout.max_concurrency {
            config.fanout.max_concurrency = concurrency.max(1);
        }
        if let Some(secs) = fanout.send_timeout_secs {
            config.fanout.send_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(goals) = raw.goals {
        if let Some(days) = goals.deadline_days {
            config.goals.deadline_days = days;
        }
        if let Some(rate) = goals.monthly_savings_rate.filter(|r| *r > 0.0) {
            config.goals.monthly_savings_rate = rate;
        }
    }

    if let Some(channels) = raw.channels {
        config.channels.email_webhook = channels.email_webhook.filter(|u| !u.is_empty());
        config.channels.bot_webhook = channels.bot_webhook.filter(|u| !u.is_empty());
    }

    Ok(config)
}
