//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Beacon - Spending anomaly and budget alerts
#[derive(Parser)]
#[command(name = "beacon")]
#[command(about = "Spending anomaly detection and alert dispatch", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "beacon.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set BEACON_DB_KEY environment variable with your passphrase.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    /// Alert configuration file (TOML)
    ///
    /// Defaults to BEACON_ALERT_CONFIG, then ~/.config/beacon/alerts.toml,
    /// then built-in defaults.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Manage users
    Users {
        #[command(subcommand)]
        action: Option<UsersAction>,
    },

    /// Run anomaly detection for a user
    Detect {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Days to look back
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// z-score threshold (defaults to the configured threshold)
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Show budget pacing for a user
    Pacing {
        /// User ID
        #[arg(short, long)]
        user: i64,
    },

    /// Run one alert sweep over every user
    Sweep,

    /// List a user's notifications
    Notifications {
        /// User ID
        #[arg(short, long)]
        user: i64,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,

        /// Maximum number to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Add a user
    Add {
        /// Email address (unique)
        email: String,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,
    },

    /// List users
    List,
}
