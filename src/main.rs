//! Task Manager Server
//!
//! HTTP backend for tracking tasks across users, statuses and labels.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use task_manager::api::{self, AppState};
use task_manager::auth;
use task_manager::cli::{Cli, Command};
use task_manager::config::Config;
use task_manager::db::Database;
use task_manager::logging::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log, cli.verbose)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.ensure_db_dir()?;

    info!("Starting Task Manager v{}", env!("CARGO_PKG_VERSION"));
    info!("Database: {:?}", config.server.db_path);

    let db = Arc::new(Database::open(&config.server.db_path)?);
    info!("Database initialized successfully");

    let command = cli.command();
    if config.seed.enabled || command == Command::Seed {
        let cost = config.auth.bcrypt_cost;
        db.seed_defaults(&config.seed, |password| {
            Ok(auth::hash_password(password, cost)?)
        })?;
    }

    match command {
        Command::Seed => Ok(()),
        Command::Serve => {
            let purged = db.purge_expired_sessions()?;
            if purged > 0 {
                info!(purged, "Removed expired sessions");
            }

            let state = AppState::new(db, Arc::new(config));
            api::start_server(state, shutdown_signal()).await
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
