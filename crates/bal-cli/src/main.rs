//! bal-cron - One-shot runner for external schedulers
//!
//! Runs a single named task under the shared run-lock, then exits. Task
//! failures are logged; the exit code stays 0.

mod cli;
mod error;

use std::time::Duration;

use bal_core::config::EngineConfig;
use bal_core::lock::RunLock;
use bal_core::{DatabaseService, Engine, TaskKind, TaskOutcome};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use error::CliError;

const DEFAULT_LOG_FILTER: &str = "bal_core=info,bal_cron=info";
/// One lease for every task: all of them write the same BaseLocale rows
const CRON_LOCK_KEY: &str = "cron.run";

#[tokio::main]
async fn main() {
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let kind = TaskKind::from(cli.task);

    match run(kind, cli).await {
        Ok(Some(outcome)) => tracing::info!(
            task = %kind,
            affected = outcome.affected,
            failed = outcome.failed,
            "Task finished"
        ),
        Ok(None) => {}
        Err(error) => tracing::error!(task = %kind, "Task failed: {}", error),
    }
}

async fn run(kind: TaskKind, cli: Cli) -> Result<Option<TaskOutcome>, CliError> {
    let mut config = EngineConfig::from_env()?;
    if let Some(db_path) = cli.db_path {
        config.database_path = db_path;
    }

    let db =
        DatabaseService::open_path(config.database_path.clone(), config.replica.clone()).await?;
    let engine = Engine::from_config(db.clone(), &config)?;
    let outcome = run_locked(&engine, kind, config.cron_lock_ttl).await;

    if let Err(error) = db.sync().await {
        tracing::warn!("Failed to sync database replica: {}", error);
    }
    outcome
}

/// Run `kind` unless another invocation holds the cron lease
async fn run_locked(
    engine: &Engine,
    kind: TaskKind,
    ttl: Duration,
) -> Result<Option<TaskOutcome>, CliError> {
    let outcome = RunLock::run(engine.db(), CRON_LOCK_KEY, ttl, || engine.run_task(kind)).await?;
    Ok(outcome.transpose()?)
}
