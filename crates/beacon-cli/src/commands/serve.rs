//! Server command implementation

use std::path::Path;

use anyhow::{Context, Result};
use beacon_core::AlertConfig;

use super::open_db;

pub async fn cmd_serve(
    db_path: &Path,
    config: AlertConfig,
    host: &str,
    port: u16,
    no_encrypt: bool,
) -> Result<()> {
    println!("🚀 Starting Beacon server...");
    println!("   Database: {}", db_path.display());
    println!("   Listening: http://{}:{}", host, port);
    println!(
        "   Channels: in-app{}{}",
        if config.channels.email_webhook.is_some() { ", email" } else { "" },
        if config.channels.bot_webhook.is_some() { ", bot" } else { "" }
    );

    if host != "127.0.0.1" && host != "localhost" {
        println!();
        println!("   ⚠️  The API has no authentication - keep it on a trusted network");
    }
    println!();

    let db = open_db(db_path, no_encrypt)?;
    beacon_server::serve(db, config, host, port)
        .await
        .context("Server error")
}
