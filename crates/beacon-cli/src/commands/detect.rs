//! Anomaly detection command

use anyhow::{Context, Result};
use beacon_core::db::Database;
use beacon_core::detect::{AnomalyDetector, DetectionResult};
use beacon_core::AlertConfig;
use chrono::{DateTime, Duration, Utc};

use super::{format_amount, truncate};

pub fn cmd_detect(
    db: &Database,
    config: &AlertConfig,
    user_id: i64,
    days: i64,
    threshold: Option<f64>,
    now: DateTime<Utc>,
) -> Result<DetectionResult> {
    if days <= 0 {
        anyhow::bail!("--days must be positive");
    }
    db.get_user(user_id)?
        .with_context(|| format!("User {} not found", user_id))?;

    println!("🔍 Scanning the last {} days for user {}...", days, user_id);

    let detector = AnomalyDetector::with_config(db, config.detection.clone());
    let result = detector
        .detect(user_id, now - Duration::days(days), now, threshold.unwrap_or(0.0))
        .context("Anomaly detection failed")?;
    db.record_anomaly_analysis(&result)
        .context("Failed to record analysis")?;

    println!(
        "   Scanned {} expenses (threshold z ≥ {})",
        result.transactions_scanned, result.threshold
    );

    if result.anomalies.is_empty() {
        println!("✅ No anomalies found");
        return Ok(result);
    }

    println!();
    println!("⚠️  {} anomalies", result.anomalies.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for anomaly in &result.anomalies {
        println!(
            "   {}  {:>14}  {:<16} score {:.2} ({})",
            anomaly.occurred_at.format("%Y-%m-%d"),
            format_amount(anomaly.amount),
            truncate(&anomaly.category_name, 16),
            anomaly.score,
            anomaly.kind.as_str()
        );
        println!("      {}", anomaly.description);
    }
    println!();

    Ok(result)
}
