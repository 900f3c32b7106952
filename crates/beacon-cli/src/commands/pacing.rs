//! Budget pacing command

use anyhow::{Context, Result};
use beacon_core::db::Database;
use beacon_core::pacing::{BudgetPacer, BudgetPacing};
use chrono::{DateTime, Utc};

use super::{format_amount, truncate};

pub fn cmd_pacing(db: &Database, user_id: i64, now: DateTime<Utc>) -> Result<BudgetPacing> {
    db.get_user(user_id)?
        .with_context(|| format!("User {} not found", user_id))?;

    let pacing = BudgetPacer::new(db)
        .pacing(user_id, now)
        .context("Failed to compute budget pacing")?;

    if pacing.budgets.is_empty() {
        println!("No active budgets for user {}", user_id);
        return Ok(pacing);
    }

    println!();
    println!("📅 Budget pacing ({} days left)", pacing.days_left);
    println!("   ─────────────────────────────────────────────────────────────");
    for pace in &pacing.budgets {
        let marker = if pace.is_over_pace { "🔴" } else { "🟢" };
        println!(
            "   {} {:<20} {:>14} / {:<14} used {:>5.1}%  allowed {:>5.1}%",
            marker,
            truncate(&pace.name, 20),
            format_amount(pace.spent),
            format_amount(pace.amount),
            pace.usage_pct,
            pace.allowed_pace_pct
        );
    }
    println!();
    println!("   Remaining:     {}", format_amount(pacing.total_remaining));
    println!("   Safe per day:  {}", format_amount(pacing.safe_to_spend_daily));
    println!("   Safe per week: {}", format_amount(pacing.safe_to_spend_weekly));
    println!(
        "   Projected end-of-period usage: {:.1}%",
        pacing.projected_end_usage_pct
    );
    println!();

    Ok(pacing)
}
