//! Builders turning detector, pacer and goal results into triggers

use chrono::{DateTime, Utc};

use crate::detect::Anomaly;
use crate::goals::{self, GoalRules};
use crate::models::{AlertKind, Goal, NotificationTrigger, SubjectKey, Transaction};
use crate::pacing::{BudgetPace, BudgetPacing};

pub fn budget_threshold(user_id: i64, pace: &BudgetPace) -> NotificationTrigger {
    NotificationTrigger::new(
        user_id,
        AlertKind::BudgetThreshold,
        "Budget nearing its limit",
        format!(
            "Budget '{}' is at {:.1}% (alert threshold {:.0}%).",
            pace.name, pace.usage_pct, pace.alert_threshold
        ),
    )
    .with_subject(SubjectKey::budget(pace.budget_id))
    .with_meta("budget_id", pace.budget_id)
    .with_meta("budget_name", pace.name.clone())
    .with_meta("usage_pct", pace.usage_pct)
    .with_meta("amount", pace.amount)
    .with_meta("spent", pace.spent)
}

pub fn budget_exceeded(user_id: i64, pace: &BudgetPace) -> NotificationTrigger {
    NotificationTrigger::new(
        user_id,
        AlertKind::BudgetExceeded,
        "Budget exceeded",
        format!("Budget '{}' is over at {:.1}%!", pace.name, pace.usage_pct),
    )
    .with_subject(SubjectKey::budget(pace.budget_id))
    .with_meta("budget_id", pace.budget_id)
    .with_meta("budget_name", pace.name.clone())
    .with_meta("usage_pct", pace.usage_pct)
    .with_meta("amount", pace.amount)
    .with_meta("spent", pace.spent)
}

pub fn budget_pacing(user_id: i64, pace: &BudgetPace) -> NotificationTrigger {
    NotificationTrigger::new(
        user_id,
        AlertKind::BudgetPacing,
        "Spending ahead of budget pace",
        format!(
            "Budget '{}' is at {:.1}% against an allowed pace of {:.1}%. {} day(s) left in the period.",
            pace.name, pace.actual_pace_pct, pace.allowed_pace_pct, pace.days_left
        ),
    )
    .with_subject(SubjectKey::budget(pace.budget_id))
    .with_meta("budget_id", pace.budget_id)
    .with_meta("budget_name", pace.name.clone())
    .with_meta("allowed_pace_pct", pace.allowed_pace_pct)
    .with_meta("actual_pace_pct", pace.actual_pace_pct)
    .with_meta("days_left", pace.days_left)
}

/// Exceeded wins over threshold; an over-pace budget also gets a pacing alert
pub fn budget_alerts(pacing: &BudgetPacing) -> Vec<NotificationTrigger> {
    let mut triggers = Vec::new();
    for pace in &pacing.budgets {
        if pace.amount <= 0.0 {
            continue;
        }
        if pace.usage_pct >= 100.0 {
            triggers.push(budget_exceeded(pacing.user_id, pace));
        } else if pace.usage_pct >= pace.alert_threshold {
            triggers.push(budget_threshold(pacing.user_id, pace));
        }
        if pace.is_over_pace {
            triggers.push(budget_pacing(pacing.user_id, pace));
        }
    }
    triggers
}

pub fn goal_deadline(goal: &Goal, days_left: i64) -> NotificationTrigger {
    NotificationTrigger::new(
        goal.user_id,
        AlertKind::GoalDeadline,
        "Goal deadline approaching",
        format!("Goal '{}' is due in {} day(s)!", goal.title, days_left),
    )
    .with_subject(SubjectKey::goal(goal.id))
    .with_meta("goal_id", goal.id)
    .with_meta("goal_name", goal.title.clone())
    .with_meta("days_left", days_left)
    .with_meta("progress", goal.progress_pct())
}

pub fn goal_milestone(goal: &Goal, milestone: u32) -> NotificationTrigger {
    NotificationTrigger::new(
        goal.user_id,
        AlertKind::GoalMilestone,
        format!("Goal reached {}%", milestone),
        format!("Goal '{}' is at {:.1}%!", goal.title, goal.progress_pct()),
    )
    .with_subject(SubjectKey::goal_milestone(goal.id, milestone))
    .with_meta("goal_id", goal.id)
    .with_meta("goal_name", goal.title.clone())
    .with_meta("milestone", milestone)
    .with_meta("progress", goal.progress_pct())
}

pub fn goal_achieved(goal: &Goal) -> NotificationTrigger {
    NotificationTrigger::new(
        goal.user_id,
        AlertKind::GoalAchieved,
        "Goal achieved!",
        format!("Congratulations! You reached your goal '{}'.", goal.title),
    )
    .with_subject(SubjectKey::goal(goal.id))
    .with_meta("goal_id", goal.id)
    .with_meta("goal_name", goal.title.clone())
    .with_meta("progress", goal.progress_pct())
}

/// Achievement replaces the other goal alerts; otherwise deadline and the
/// first matching milestone both apply.
pub fn goal_alerts(goal: &Goal, now: DateTime<Utc>, rules: &GoalRules) -> Vec<NotificationTrigger> {
    if goals::newly_achieved(goal) {
        return vec![goal_achieved(goal)];
    }

    let mut triggers = Vec::new();
    if let Some(days_left) = goals::deadline_due(goal, now, rules) {
        triggers.push(goal_deadline(goal, days_left));
    }
    if let Some(milestone) = goals::milestone_reached(goal) {
        triggers.push(goal_milestone(goal, milestone));
    }
    triggers
}

pub fn anomaly(user_id: i64, anomaly: &Anomaly) -> NotificationTrigger {
    NotificationTrigger::new(
        user_id,
        AlertKind::Anomaly,
        "Unusual transaction detected",
        format!(
            "A {:.0} charge in {} looks unusual (score {:.2}).",
            anomaly.amount, anomaly.category_name, anomaly.score
        ),
    )
    .with_subject(SubjectKey::transaction(anomaly.transaction_id))
    .with_meta("transaction_id", anomaly.transaction_id)
    .with_meta("amount", anomaly.amount)
    .with_meta("category_name", anomaly.category_name.clone())
    .with_meta("score", anomaly.score)
    .with_meta("anomaly_kind", anomaly.kind.as_str())
    .with_meta("description", anomaly.description.clone())
}

/// A single expense above the configured amount
pub fn large_transaction(tx: &Transaction, threshold: f64) -> NotificationTrigger {
    let category = tx.category_name.as_deref().unwrap_or("Uncategorized");
    NotificationTrigger::new(
        tx.user_id,
        AlertKind::LargeTransaction,
        "Large transaction recorded",
        format!(
            "A {:.0} charge in {} is above your {:.0} alert amount.",
            tx.amount, category, threshold
        ),
    )
    .with_subject(SubjectKey::transaction(tx.id))
    .with_meta("transaction_id", tx.id)
    .with_meta("amount", tx.amount)
    .with_meta("category_name", category)
    .with_meta("description", tx.description.clone())
    .with_meta("threshold", threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use chrono::{Duration, TimeZone};

    fn pace(id: i64, usage: f64, over: bool) -> BudgetPace {
        BudgetPace {
            budget_id: id,
            name: format!("b{}", id),
            category_id: None,
            amount: 1000.0,
            spent: usage * 10.0,
            remaining: 1000.0 - usage * 10.0,
            usage_pct: usage,
            allowed_pace_pct: 50.0,
            actual_pace_pct: usage.min(100.0),
            is_over_pace: over,
            alert_threshold: 80.0,
            days_left: 10,
        }
    }

    fn pacing(budgets: Vec<BudgetPace>) -> BudgetPacing {
        BudgetPacing {
            user_id: 4,
            as_of: Utc::now(),
            budgets,
            risk_budget_ids: vec![],
            total_remaining: 0.0,
            days_left: 10,
            safe_to_spend_daily: 0.0,
            safe_to_spend_weekly: 0.0,
            projected_end_usage_pct: 0.0,
        }
    }

    #[test]
    fn test_budget_alert_selection() {
        let triggers = budget_alerts(&pacing(vec![
            pace(1, 40.0, false),
            pace(2, 85.0, false),
            pace(3, 120.0, true),
        ]));

        let kinds: Vec<(AlertKind, Option<SubjectKey>)> = triggers
            .iter()
            .map(|t| (t.kind, t.subject.clone()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (AlertKind::BudgetThreshold, Some(SubjectKey::budget(2))),
                (AlertKind::BudgetExceeded, Some(SubjectKey::budget(3))),
                (AlertKind::BudgetPacing, Some(SubjectKey::budget(3))),
            ]
        );
        assert_eq!(triggers[1].priority, Priority::Urgent);
        assert!(triggers.iter().all(|t| t.user_id == 4));
    }

    #[test]
    fn test_goal_alerts() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut goal = Goal {
            id: 5,
            user_id: 4,
            title: "Trip".to_string(),
            target_amount: 1000.0,
            current_amount: 510.0,
            target_date: Some(now + Duration::days(20)),
            is_achieved: false,
        };
        let rules = GoalRules::default();

        let triggers = goal_alerts(&goal, now, &rules);
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].kind, AlertKind::GoalDeadline);
        assert_eq!(triggers[1].subject, Some(SubjectKey::goal_milestone(5, 50)));

        goal.current_amount = 1000.0;
        let triggers = goal_alerts(&goal, now, &rules);
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].kind, AlertKind::GoalAchieved);
    }

    #[test]
    fn test_large_transaction_trigger() {
        let tx = Transaction {
            id: 42,
            user_id: 4,
            category_id: None,
            category_name: None,
            amount: 2_500_000.0,
            kind: crate::models::TransactionKind::Expense,
            description: Some("Laptop".to_string()),
            occurred_at: Utc::now(),
        };

        let trigger = large_transaction(&tx, 1_000_000.0);
        assert_eq!(trigger.kind, AlertKind::LargeTransaction);
        assert_eq!(trigger.subject, Some(SubjectKey::transaction(42)));
        assert_eq!(trigger.priority, Priority::Medium);
        assert_eq!(trigger.metadata["transaction_id"], 42);
        assert_eq!(trigger.metadata["category_name"], "Uncategorized");
        assert_eq!(trigger.metadata["threshold"], 1_000_000.0);
    }
}
