//! Kalah Game Protocol server (default binary).
//!
//! Configuration comes from `KGP_CONFIG` (a TOML file) and `KGP_*`
//! environment variables, see [`kgp_server::proto::config`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use kgp_server::engine::{Database, Scheduler, SchedulerConfig};
use kgp_server::proto::{run_server, ServerConfig};
use kgp_server::store::SqliteDatabase;
use kgp_server::tracing_init::{init_tracing, DEFAULT_FILTER};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load().context("failed to load configuration")?;
    init_tracing(DEFAULT_FILTER, config.log_json);

    let database: Arc<dyn Database> = Arc::new(
        SqliteDatabase::open(&config.database)
            .await
            .with_context(|| format!("failed to open database {}", config.database.display()))?,
    );
    let scheduler = Scheduler::new(SchedulerConfig::from(&config.game), Arc::clone(&database));

    tokio::select! {
        result = run_server(config, scheduler, database, None) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
    }
}
