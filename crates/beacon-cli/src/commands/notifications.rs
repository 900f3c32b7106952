//! Notification inbox command

use anyhow::{Context, Result};
use beacon_core::db::Database;
use beacon_core::models::Priority;

use super::truncate;

pub fn cmd_notifications(db: &Database, user_id: i64, unread_only: bool, limit: i64) -> Result<()> {
    let notifications = db
        .list_notifications(user_id, unread_only, limit.max(1))
        .context("Failed to list notifications")?;

    if notifications.is_empty() {
        println!("No notifications");
        return Ok(());
    }

    let unread = db.unread_count(user_id)?;
    println!();
    println!("🔔 Notifications ({} unread)", unread);
    println!("   ─────────────────────────────────────────────────────────────");
    for n in &notifications {
        let icon = match n.priority {
            Priority::Urgent => "🚨",
            Priority::High => "⚠️ ",
            Priority::Medium => "ℹ️ ",
            Priority::Low => "  ",
        };
        let read = if n.is_read { " " } else { "•" };
        println!(
            "   {}{} [{}] {} {}",
            read,
            icon,
            n.id,
            n.created_at.format("%Y-%m-%d %H:%M"),
            truncate(&n.title, 48)
        );
        println!("        {}", truncate(&n.message, 72));
    }
    println!();

    Ok(())
}
