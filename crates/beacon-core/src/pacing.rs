//! Budget pacing: is spending running ahead of the calendar?
//!
//! A budget is "over pace" when its usage exceeds 120% of the share of the
//! period already elapsed. Spent amounts are recomputed from the ledger on
//! every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::Budget;
use crate::store::LedgerStore;

/// Usage beyond `allowed * OVER_PACE_FACTOR` counts as over pace
pub const OVER_PACE_FACTOR: f64 = 1.2;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Pacing for a single budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPace {
    pub budget_id: i64,
    pub name: String,
    pub category_id: Option<i64>,
    pub amount: f64,
    pub spent: f64,
    pub remaining: f64,
    /// Unclamped, may exceed 100
    pub usage_pct: f64,
    /// Clamped to [0, 100]
    pub allowed_pace_pct: f64,
    /// Clamped to [0, 100]
    pub actual_pace_pct: f64,
    pub is_over_pace: bool,
    pub alert_threshold: f64,
    pub days_left: i64,
}

/// Pacing across all in-window budgets of a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetPacing {
    pub user_id: i64,
    pub as_of: DateTime<Utc>,
    pub budgets: Vec<BudgetPace>,
    /// Budgets flagged over pace
    pub risk_budget_ids: Vec<i64>,
    pub total_remaining: f64,
    /// 0 when no budget is in window
    pub days_left: i64,
    pub safe_to_spend_daily: f64,
    pub safe_to_spend_weekly: f64,
    pub projected_end_usage_pct: f64,
}

fn days_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Compute the pace of one budget given what has been spent so far
pub fn pace_budget(budget: &Budget, spent: f64, now: DateTime<Utc>) -> BudgetPace {
    let remaining = budget.amount - spent;
    let usage_pct = if budget.amount > 0.0 {
        100.0 * spent / budget.amount
    } else {
        0.0
    };

    let total_days = days_between(budget.start_date, budget.end_date).round().max(1.0);
    let elapsed_days = days_between(budget.start_date, now).round().max(1.0);
    let allowed = 100.0 * elapsed_days / total_days;

    BudgetPace {
        budget_id: budget.id,
        name: budget.name.clone(),
        category_id: budget.category_id,
        amount: budget.amount,
        spent,
        remaining,
        usage_pct,
        allowed_pace_pct: allowed.clamp(0.0, 100.0),
        actual_pace_pct: usage_pct.clamp(0.0, 100.0),
        is_over_pace: usage_pct > allowed * OVER_PACE_FACTOR,
        alert_threshold: budget.alert_threshold,
        days_left: days_left(budget, now),
    }
}

/// Whole days left in the budget window, counting today, at least 1
fn days_left(budget: &Budget, now: DateTime<Utc>) -> i64 {
    (days_between(now, budget.end_date).ceil() as i64).max(1)
}

/// Aggregate per-budget paces. `budgets` pairs each budget with its spend;
/// budgets whose window does not contain `now` are skipped entirely.
pub fn aggregate(user_id: i64, budgets: &[(Budget, f64)], now: DateTime<Utc>) -> BudgetPacing {
    let mut paces = Vec::new();
    let mut total_remaining = 0.0;
    let mut min_days_left: Option<i64> = None;

    for (budget, spent) in budgets {
        if !budget.contains(now) {
            continue;
        }
        let pace = pace_budget(budget, *spent, now);
        total_remaining += pace.remaining.max(0.0);
        min_days_left = Some(match min_days_left {
            Some(d) => d.min(pace.days_left),
            None => pace.days_left,
        });
        paces.push(pace);
    }

    let days_left = min_days_left.unwrap_or(0);
    let safe_to_spend_daily = if days_left > 0 {
        total_remaining / days_left as f64
    } else {
        0.0
    };

    let (weighted, weight) = paces
        .iter()
        .filter(|p| p.amount > 0.0)
        .fold((0.0, 0.0), |(w, s), p| (w + p.usage_pct * p.amount, s + p.amount));
    let projected_end_usage_pct = if weight > 0.0 { weighted / weight } else { 0.0 };

    let risk_budget_ids = paces
        .iter()
        .filter(|p| p.is_over_pace)
        .map(|p| p.budget_id)
        .collect();

    BudgetPacing {
        user_id,
        as_of: now,
        budgets: paces,
        risk_budget_ids,
        total_remaining,
        days_left,
        safe_to_spend_daily,
        safe_to_spend_weekly: safe_to_spend_daily * 7.0,
        projected_end_usage_pct,
    }
}

/// Computes pacing from the ledger
pub struct BudgetPacer<'a> {
    ledger: &'a dyn LedgerStore,
}

impl<'a> BudgetPacer<'a> {
    pub fn new(ledger: &'a dyn LedgerStore) -> Self {
        Self { ledger }
    }

    /// Recompute spend for every active budget and aggregate the pacing
    pub fn pacing(&self, user_id: i64, now: DateTime<Utc>) -> Result<BudgetPacing> {
        let budgets = self.budgets_with_spend(user_id, now)?;
        let pacing = aggregate(user_id, &budgets, now);
        debug!(
            user_id,
            budgets = pacing.budgets.len(),
            at_risk = pacing.risk_budget_ids.len(),
            "Budget pacing computed"
        );
        Ok(pacing)
    }

    /// Active in-window budgets paired with their current spend
    pub fn budgets_with_spend(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Budget, f64)>> {
        let mut out = Vec::new();
        for budget in self.ledger.list_active_budgets(user_id, now)? {
            if !budget.is_active || !budget.contains(now) {
                continue;
            }
            let spent: f64 = self
                .ledger
                .list_expenses(user_id, budget.start_date, budget.end_date)?
                .iter()
                .filter(|tx| budget.matches(tx))
                .map(|tx| tx.amount)
                .sum();
            out.push((budget, spent));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BudgetPeriod, DEFAULT_ALERT_THRESHOLD};
    use chrono::{Duration, TimeZone};

    fn budget(id: i64, amount: f64, start: DateTime<Utc>, days: i64) -> Budget {
        Budget {
            id,
            user_id: 1,
            name: format!("budget-{}", id),
            category_id: None,
            amount,
            period: BudgetPeriod::Monthly,
            start_date: start,
            end_date: start + Duration::days(days),
            alert_threshold: DEFAULT_ALERT_THRESHOLD,
            is_active: true,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_half_spent_a_third_through_is_over_pace() {
        let b = budget(1, 1_000_000.0, start(), 30);
        let pace = pace_budget(&b, 500_000.0, start() + Duration::days(10));

        assert_eq!(pace.usage_pct, 50.0);
        assert!((pace.allowed_pace_pct - 33.333).abs() < 0.01);
        assert!(pace.is_over_pace);
        assert_eq!(pace.remaining, 500_000.0);
        assert_eq!(pace.days_left, 20);
    }

    #[test]
    fn test_pace_values_clamped() {
        let b = budget(1, 100.0, start(), 30);
        let pace = pace_budget(&b, 250.0, start() + Duration::days(3));
        assert_eq!(pace.usage_pct, 250.0);
        assert_eq!(pace.actual_pace_pct, 100.0);
        assert!(pace.allowed_pace_pct <= 100.0 && pace.allowed_pace_pct >= 0.0);
        assert!(pace.is_over_pace);

        let zero = budget(2, 0.0, start(), 30);
        let pace = pace_budget(&zero, 40.0, start() + Duration::days(3));
        assert_eq!(pace.usage_pct, 0.0);
        assert!(!pace.is_over_pace);
    }

    #[test]
    fn test_first_day_counts_as_one_elapsed_day() {
        let b = budget(1, 300.0, start(), 30);
        let pace = pace_budget(&b, 0.0, start() + Duration::hours(2));
        assert!((pace.allowed_pace_pct - 100.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_skips_out_of_window_budgets() {
        let now = start() + Duration::days(10);
        let current = budget(1, 1_000.0, start(), 30);
        let future = budget(2, 5_000.0, start() + Duration::days(40), 30);

        let pacing = aggregate(1, &[(current, 500.0), (future, 0.0)], now);
        assert_eq!(pacing.budgets.len(), 1);
        assert_eq!(pacing.days_left, 20);
        assert_eq!(pacing.total_remaining, 500.0);
        assert_eq!(pacing.safe_to_spend_daily, 25.0);
        assert_eq!(pacing.safe_to_spend_weekly, 175.0);
        assert_eq!(pacing.risk_budget_ids, vec![1]);
    }

    #[test]
    fn test_aggregate_weighted_projection_and_min_days() {
        let now = start() + Duration::days(5);
        let a = budget(1, 100.0, start(), 30);
        let b = budget(2, 300.0, start(), 10);
        let overspent = budget(3, 50.0, start(), 30);

        let pacing = aggregate(1, &[(a, 50.0), (b, 30.0), (overspent, 80.0)], now);
        // min days left is the 10 day budget
        assert_eq!(pacing.days_left, 5);
        // overspent budget contributes 0 remaining
        assert_eq!(pacing.total_remaining, 50.0 + 270.0);
        let expected = (50.0 * 100.0 + 10.0 * 300.0 + 160.0 * 50.0) / 450.0;
        assert!((pacing.projected_end_usage_pct - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_budgets() {
        let pacing = aggregate(1, &[], start());
        assert_eq!(pacing.days_left, 0);
        assert_eq!(pacing.safe_to_spend_daily, 0.0);
        assert_eq!(pacing.projected_end_usage_pct, 0.0);
    }
}
