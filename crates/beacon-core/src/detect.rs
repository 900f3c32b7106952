//! Transaction anomaly detection
//!
//! Scores every expense in a window against robust per-category statistics:
//! - Amount anomalies: robust z-score at or above the sensitivity threshold
//! - Seasonal spikes: at least twice the category's older-half baseline
//!
//! Categories with too few samples borrow global statistics computed over all
//! expenses in the window, so sparse categories still get scored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::{Transaction, TransactionKind};
use crate::stats::{seasonal_baseline, CategoryStats, RobustStats};
use crate::store::LedgerStore;

/// Sensitivity used when the caller passes a non-positive threshold
pub const DEFAULT_THRESHOLD: f64 = 3.5;

/// Detection configuration
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Default z-score threshold
    pub threshold: f64,
    /// Samples a category needs before local stats are trusted
    pub local_min_samples: usize,
    /// Samples a category needs before a seasonal baseline is computed
    pub seasonal_min_samples: usize,
    /// Multiple of the seasonal baseline that counts as a spike
    pub seasonal_multiplier: f64,
    /// Minimum score given to seasonal spikes
    pub seasonal_min_score: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            local_min_samples: 5,
            seasonal_min_samples: 6,
            seasonal_multiplier: 2.0,
            seasonal_min_score: 0.8,
        }
    }
}

/// Why a transaction was flagged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Amount,
    Seasonal,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Amount => "amount",
            Self::Seasonal => "seasonal",
        }
    }
}

/// A flagged transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub transaction_id: i64,
    pub amount: f64,
    pub category_id: Option<i64>,
    pub category_name: String,
    /// In [0, 1]
    pub score: f64,
    pub kind: AnomalyKind,
    pub z_score: f64,
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Output of one detection run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub user_id: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Effective threshold after defaulting
    pub threshold: f64,
    /// Highest score first
    pub anomalies: Vec<Anomaly>,
    /// Mean of the emitted anomaly scores, 0 when nothing was flagged
    pub score: f64,
    pub transactions_scanned: usize,
}

/// Scores a user's expenses for anomalies
pub struct AnomalyDetector<'a> {
    ledger: &'a dyn LedgerStore,
    config: DetectionConfig,
}

impl<'a> AnomalyDetector<'a> {
    pub fn new(ledger: &'a dyn LedgerStore) -> Self {
        Self {
            ledger,
            config: DetectionConfig::default(),
        }
    }

    pub fn with_config(ledger: &'a dyn LedgerStore, config: DetectionConfig) -> Self {
        Self { ledger, config }
    }

    /// Detect anomalies in `[start, end]`.
    ///
    /// Ledger read failures propagate; there are no partial results.
    pub fn detect(
        &self,
        user_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        threshold: f64,
    ) -> Result<DetectionResult> {
        let transactions = self.ledger.list_expenses(user_id, start, end)?;
        let threshold = self.effective_threshold(threshold);
        let anomalies = score_transactions(&transactions, threshold, &self.config);

        let score = if anomalies.is_empty() {
            0.0
        } else {
            anomalies.iter().map(|a| a.score).sum::<f64>() / anomalies.len() as f64
        };

        debug!(
            user_id,
            scanned = transactions.len(),
            flagged = anomalies.len(),
            "Anomaly detection complete"
        );

        Ok(DetectionResult {
            user_id,
            window_start: start,
            window_end: end,
            threshold,
            anomalies,
            score,
            transactions_scanned: transactions.len(),
        })
    }

    fn effective_threshold(&self, threshold: f64) -> f64 {
        if threshold > 0.0 {
            threshold
        } else if self.config.threshold > 0.0 {
            self.config.threshold
        } else {
            DEFAULT_THRESHOLD
        }
    }
}

/// Compute the stats each category is scored against
pub fn category_stats(transactions: &[Transaction], config: &DetectionConfig) -> Vec<CategoryStats> {
    let expenses: Vec<&Transaction> = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Expense)
        .collect();

    let all_amounts: Vec<f64> = expenses.iter().map(|t| t.amount).collect();
    let global = RobustStats::from_amounts(&all_amounts);

    let mut by_category: BTreeMap<Option<i64>, Vec<&Transaction>> = BTreeMap::new();
    for tx in &expenses {
        by_category.entry(tx.category_id).or_default().push(tx);
    }

    by_category
        .into_iter()
        .map(|(category_id, mut txs)| {
            txs.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
            let amounts: Vec<f64> = txs.iter().map(|t| t.amount).collect();

            let local = amounts.len() >= config.local_min_samples;
            let stats = if local {
                RobustStats::from_amounts(&amounts)
            } else {
                global
            };

            CategoryStats {
                category_id,
                median: stats.median,
                mad: stats.mad,
                sample_count: amounts.len(),
                seasonal_baseline: seasonal_baseline(&amounts, config.seasonal_min_samples),
                local,
            }
        })
        .collect()
}

/// Score every expense and return the flagged ones, highest score first
pub fn score_transactions(
    transactions: &[Transaction],
    threshold: f64,
    config: &DetectionConfig,
) -> Vec<Anomaly> {
    let stats: BTreeMap<Option<i64>, CategoryStats> = category_stats(transactions, config)
        .into_iter()
        .map(|s| (s.category_id, s))
        .collect();

    let mut anomalies: Vec<Anomaly> = transactions
        .iter()
        .filter(|t| t.kind == TransactionKind::Expense)
        .filter_map(|tx| {
            let cat = stats.get(&tx.category_id)?;
            score_one(tx, cat, threshold, config)
        })
        .collect();

    anomalies.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| b.amount.total_cmp(&a.amount))
            .then_with(|| a.transaction_id.cmp(&b.transaction_id))
    });
    anomalies
}

fn score_one(
    tx: &Transaction,
    cat: &CategoryStats,
    threshold: f64,
    config: &DetectionConfig,
) -> Option<Anomaly> {
    let robust = RobustStats {
        median: cat.median,
        mad: cat.mad,
    };
    let z = robust.z_score(tx.amount);
    let by_amount = z >= threshold;
    let spike = cat
        .seasonal_baseline
        .is_some_and(|baseline| tx.amount >= config.seasonal_multiplier * baseline);

    if !by_amount && !spike {
        return None;
    }

    let mut score = (z / threshold).min(1.0);
    if spike && score < config.seasonal_min_score {
        score = config.seasonal_min_score;
    }

    let category_name = tx
        .category_name
        .clone()
        .unwrap_or_else(|| "Uncategorized".to_string());

    let (kind, description) = if by_amount {
        (
            AnomalyKind::Amount,
            format!(
                "{:.2} in {} is far from the typical {:.2} (z = {:.1})",
                tx.amount, category_name, cat.median, z
            ),
        )
    } else {
        (
            AnomalyKind::Seasonal,
            format!(
                "{:.2} in {} is at least {:.0}x the earlier baseline of {:.2}",
                tx.amount,
                category_name,
                config.seasonal_multiplier,
                cat.seasonal_baseline.unwrap_or_default()
            ),
        )
    };

    Some(Anomaly {
        transaction_id: tx.id,
        amount: tx.amount,
        category_id: tx.category_id,
        category_name,
        score,
        kind,
        z_score: z,
        description,
        occurred_at: tx.occurred_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn tx(id: i64, category_id: i64, amount: f64, day: i64) -> Transaction {
        Transaction {
            id,
            user_id: 1,
            category_id: Some(category_id),
            category_name: Some(format!("cat-{}", category_id)),
            amount,
            kind: TransactionKind::Expense,
            description: None,
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::days(day),
        }
    }

    fn dining() -> Vec<Transaction> {
        [50_000.0, 55_000.0, 48_000.0, 52_000.0, 300_000.0, 51_000.0]
            .iter()
            .enumerate()
            .map(|(i, amount)| tx(i as i64 + 1, 1, *amount, i as i64))
            .collect()
    }

    #[test]
    fn test_dining_outlier_flagged_with_full_score() {
        let anomalies = score_transactions(&dining(), 3.5, &DetectionConfig::default());

        let outlier = anomalies
            .iter()
            .find(|a| a.transaction_id == 5)
            .expect("300k should be flagged");
        assert_eq!(outlier.score, 1.0);
        assert_eq!(outlier.kind, AnomalyKind::Amount);
        assert!((outlier.z_score - 67.0).abs() < 0.5);
        assert_eq!(anomalies[0].transaction_id, 5);
    }

    #[test]
    fn test_seasonal_override_below_threshold() {
        // Older half median is 10; 20 is exactly 2x.
        let txs: Vec<Transaction> = [10.0, 10.0, 10.0, 20.0, 20.0, 20.0]
            .iter()
            .enumerate()
            .map(|(i, amount)| tx(i as i64 + 1, 1, *amount, i as i64))
            .collect();

        let anomalies = score_transactions(&txs, 3.5, &DetectionConfig::default());
        assert_eq!(anomalies.len(), 3);
        for a in &anomalies {
            assert_eq!(a.kind, AnomalyKind::Seasonal);
            assert!(a.z_score < 3.5);
            assert!(a.score >= 0.8);
        }
    }

    #[test]
    fn test_small_category_uses_global_stats() {
        let mut txs = dining();
        txs.push(tx(100, 2, 51_000.0, 3));
        txs.push(tx(101, 2, 250_000.0, 4));

        let stats = category_stats(&txs, &DetectionConfig::default());
        let small = stats.iter().find(|s| s.category_id == Some(2)).unwrap();
        assert!(!small.local);
        assert!(small.seasonal_baseline.is_none());

        let anomalies = score_transactions(&txs, 3.5, &DetectionConfig::default());
        assert!(anomalies.iter().any(|a| a.transaction_id == 101));
        assert!(!anomalies.iter().any(|a| a.transaction_id == 100));
    }

    #[test]
    fn test_raising_threshold_never_adds_anomalies() {
        let mut txs = dining();
        txs.extend((0..8).map(|i| tx(200 + i, 3, 20.0 + (i * 7) as f64, i)));
        txs.push(tx(300, 3, 95.0, 9));

        let config = DetectionConfig::default();
        let mut previous = usize::MAX;
        for threshold in [0.5, 1.0, 2.0, 3.5, 5.0, 10.0, 100.0] {
            let count = score_transactions(&txs, threshold, &config).len();
            assert!(count <= previous, "threshold {} flagged more", threshold);
            previous = count;
        }
    }

    #[test]
    fn test_income_and_transfers_ignored() {
        let mut txs = dining();
        let mut income = tx(50, 1, 9_000_000.0, 2);
        income.kind = TransactionKind::Income;
        txs.push(income);

        let anomalies = score_transactions(&txs, 3.5, &DetectionConfig::default());
        assert!(!anomalies.iter().any(|a| a.transaction_id == 50));
    }

    #[test]
    fn test_empty_input() {
        assert!(score_transactions(&[], 3.5, &DetectionConfig::default()).is_empty());
        assert!(category_stats(&[], &DetectionConfig::default()).is_empty());
    }
}
