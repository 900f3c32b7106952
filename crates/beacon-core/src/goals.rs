//! Goal progress checks: deadlines, milestones, achievement and projection

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::Goal;

/// Progress milestones, in ascending order
pub const MILESTONES: [u32; 4] = [25, 50, 75, 90];

/// Width of the band above a milestone in which it still fires
pub const MILESTONE_BAND: f64 = 5.0;

/// Assumed monthly savings as a share of the target, absent real history
pub const DEFAULT_MONTHLY_SAVINGS_RATE: f64 = 0.10;

const DAYS_PER_MONTH: f64 = 30.0;

/// Goal-check settings
#[derive(Debug, Clone)]
pub struct GoalRules {
    /// Deadline warnings fire when this many days or fewer remain
    pub deadline_days: i64,
    pub monthly_savings_rate: f64,
}

impl Default for GoalRules {
    fn default() -> Self {
        Self {
            deadline_days: 30,
            monthly_savings_rate: DEFAULT_MONTHLY_SAVINGS_RATE,
        }
    }
}

/// Whole days until the goal's target date (truncated), if it has one
pub fn days_until_deadline(goal: &Goal, now: DateTime<Utc>) -> Option<i64> {
    goal.target_date.map(|d| (d - now).num_days())
}

/// Days left when the goal is inside its deadline warning window
pub fn deadline_due(goal: &Goal, now: DateTime<Utc>, rules: &GoalRules) -> Option<i64> {
    if goal.is_achieved {
        return None;
    }
    days_until_deadline(goal, now).filter(|days| *days > 0 && *days <= rules.deadline_days)
}

/// The milestone whose band `[m, m + 5)` contains the goal's progress
pub fn milestone_reached(goal: &Goal) -> Option<u32> {
    let progress = goal.progress_pct();
    MILESTONES.iter().copied().find(|m| {
        let m = *m as f64;
        progress >= m && progress < m + MILESTONE_BAND
    })
}

/// Whether a goal has reached its target but is not yet marked achieved
pub fn newly_achieved(goal: &Goal) -> bool {
    !goal.is_achieved && goal.target_amount > 0.0 && goal.current_amount >= goal.target_amount
}

/// Projection of whether a goal will be met by its deadline
#[derive(Debug, Clone, Serialize)]
pub struct GoalProjection {
    pub goal_id: i64,
    pub progress_pct: f64,
    pub remaining_amount: f64,
    pub months_remaining: Option<f64>,
    /// Savings per month needed to hit the target on time
    pub required_monthly: Option<f64>,
    /// Assumed savings per month
    pub projected_monthly: f64,
    /// Months to completion at the projected rate
    pub months_to_complete: Option<f64>,
    pub on_track: bool,
}

/// Project completion using the configured monthly savings rate
pub fn project(goal: &Goal, now: DateTime<Utc>, rules: &GoalRules) -> GoalProjection {
    let remaining = (goal.target_amount - goal.current_amount).max(0.0);
    let projected_monthly = goal.target_amount.max(0.0) * rules.monthly_savings_rate;

    let months_remaining = goal
        .target_date
        .map(|d| ((d - now).num_days() as f64 / DAYS_PER_MONTH).max(0.0));

    let required_monthly = months_remaining.map(|m| if m > 0.0 { remaining / m } else { remaining });

    let months_to_complete = if remaining == 0.0 {
        Some(0.0)
    } else if projected_monthly > 0.0 {
        Some(remaining / projected_monthly)
    } else {
        None
    };

    let on_track = match (months_to_complete, months_remaining) {
        _ if remaining == 0.0 => true,
        (Some(needed), Some(left)) => needed <= left,
        // No deadline: on track as long as progress is possible
        (Some(_), None) => true,
        (None, _) => false,
    };

    GoalProjection {
        goal_id: goal.id,
        progress_pct: goal.progress_pct(),
        remaining_amount: remaining,
        months_remaining,
        required_monthly,
        projected_monthly,
        months_to_complete,
        on_track,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn goal(current: f64, target: f64, days: Option<i64>) -> Goal {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Goal {
            id: 9,
            user_id: 1,
            title: "Emergency fund".to_string(),
            target_amount: target,
            current_amount: current,
            target_date: days.map(|d| now + Duration::days(d)),
            is_achieved: false,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_milestone_bands() {
        assert_eq!(milestone_reached(&goal(24.9, 100.0, None)), None);
        assert_eq!(milestone_reached(&goal(25.0, 100.0, None)), Some(25));
        assert_eq!(milestone_reached(&goal(29.9, 100.0, None)), Some(25));
        assert_eq!(milestone_reached(&goal(30.0, 100.0, None)), None);
        assert_eq!(milestone_reached(&goal(92.0, 100.0, None)), Some(90));
        assert_eq!(milestone_reached(&goal(50.0, 0.0, None)), None);
    }

    #[test]
    fn test_deadline_window() {
        let rules = GoalRules::default();
        assert_eq!(deadline_due(&goal(0.0, 100.0, Some(30)), now(), &rules), Some(30));
        assert_eq!(deadline_due(&goal(0.0, 100.0, Some(31)), now(), &rules), None);
        assert_eq!(deadline_due(&goal(0.0, 100.0, Some(0)), now(), &rules), None);
        assert_eq!(deadline_due(&goal(0.0, 100.0, None), now(), &rules), None);

        let mut done = goal(0.0, 100.0, Some(10));
        done.is_achieved = true;
        assert_eq!(deadline_due(&done, now(), &rules), None);
    }

    #[test]
    fn test_newly_achieved() {
        assert!(newly_achieved(&goal(100.0, 100.0, None)));
        assert!(!newly_achieved(&goal(99.0, 100.0, None)));
        let mut g = goal(120.0, 100.0, None);
        g.is_achieved = true;
        assert!(!newly_achieved(&g));
    }

    #[test]
    fn test_projection_uses_savings_rate() {
        let rules = GoalRules::default();
        // 10% of 1200 per month, 600 remaining => 5 months needed
        let on_time = project(&goal(600.0, 1200.0, Some(180)), now(), &rules);
        assert_eq!(on_time.projected_monthly, 120.0);
        assert_eq!(on_time.months_to_complete, Some(5.0));
        assert!(on_time.on_track);

        let late = project(&goal(600.0, 1200.0, Some(60)), now(), &rules);
        assert!(!late.on_track);
        assert_eq!(late.required_monthly, Some(300.0));

        let generous = GoalRules {
            monthly_savings_rate: 0.5,
            ..Default::default()
        };
        assert!(project(&goal(600.0, 1200.0, Some(60)), now(), &generous).on_track);
    }
}
