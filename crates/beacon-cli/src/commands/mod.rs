//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, load_config)
//! - `users` - User management (add, list)
//! - `detect` - Anomaly detection
//! - `pacing` - Budget pacing report
//! - `notifications` - Notification inbox
//! - `sweep` - One-off alert sweep
//! - `serve` - Web server command

pub mod core;
pub mod detect;
pub mod notifications;
pub mod pacing;
pub mod serve;
pub mod sweep;
pub mod users;

// Re-export command functions for main.rs
pub use self::core::*;
pub use detect::*;
pub use notifications::*;
pub use pacing::*;
pub use serve::*;
pub use sweep::*;
pub use users::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}{}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}
