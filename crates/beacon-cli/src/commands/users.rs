//! User management commands

use anyhow::{Context, Result};
use beacon_core::db::Database;

pub fn cmd_users_add(db: &Database, email: &str, name: Option<&str>) -> Result<i64> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        anyhow::bail!("Invalid email address: '{}'", email);
    }

    let id = db
        .create_user(email, name)
        .with_context(|| format!("Failed to add user {}", email))?;
    println!("✅ Added user {} (id {})", email, id);
    Ok(id)
}

pub fn cmd_users_list(db: &Database) -> Result<()> {
    let users = db.list_users().context("Failed to list users")?;

    if users.is_empty() {
        println!("No users yet. Add one with: beacon users add EMAIL");
        return Ok(());
    }

    println!();
    println!("👤 Users ({})", users.len());
    println!("   ─────────────────────────────────────────────────────────────");
    for user in &users {
        println!(
            "   {:>4}  {:<32} {}",
            user.id,
            user.email,
            user.name.as_deref().unwrap_or("")
        );
    }
    println!();

    Ok(())
}
