//! Beacon CLI - Spending anomaly and budget alerts
//!
//! Usage:
//!   beacon init                        Initialize database
//!   beacon users add EMAIL             Add a user
//!   beacon detect --user 1             Run anomaly detection
//!   beacon pacing --user 1             Show budget pacing
//!   beacon sweep                       Run all alert checks once
//!   beacon serve --port 3000           Start web server

mod cli;
mod commands;


use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Users { action } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match action {
                Some(UsersAction::Add { email, name }) => {
                    commands::cmd_users_add(&db, &email, name.as_deref()).map(|_| ())
                }
                None | Some(UsersAction::List) => commands::cmd_users_list(&db),
            }
        }
        Commands::Detect {
            user,
            days,
            threshold,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_detect(&db, &config, user, days, threshold, Utc::now()).map(|_| ())
        }
        Commands::Pacing { user } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_pacing(&db, user, Utc::now()).map(|_| ())
        }
        Commands::Sweep => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_sweep(db, config).await.map(|_| ())
        }
        Commands::Notifications {
            user,
            unread,
            limit,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_notifications(&db, user, unread, limit)
        }
        Commands::Serve { port, host } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_serve(&cli.db, config, &host, port, cli.no_encrypt).await
        }
    }
}
