//! bal-api - Long-running publication worker
//!
//! Owns the task queue, drives the periodic reconciliation timers and
//! serves the synchronous publication endpoints.

mod config;
mod error;
mod routes;

use bal_core::scheduler::Scheduler;
use bal_core::{DatabaseService, Engine, TaskQueue};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use config::AppConfig;
use routes::{app_router, AppState};

const DEFAULT_LOG_FILTER: &str = "bal_core=info,bal_api=info,tower_http=info";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only load .env in development; production injects the environment.
    #[cfg(debug_assertions)]
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!("Starting bal-api with config: {:?}", config);

    let db = DatabaseService::open_path(
        config.engine.database_path.clone(),
        config.engine.replica.clone(),
    )
    .await?;
    let engine = Engine::from_config(db, &config.engine)?;

    let (shutdown, _) = broadcast::channel(1);
    let (queue, worker) = TaskQueue::start(engine.clone(), shutdown.subscribe());
    let scheduler = Scheduler::new(queue.clone(), config.engine.intervals);
    let timers = tokio::spawn(scheduler.run(shutdown.subscribe()));

    let router = app_router(AppState::new(queue, engine));
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("bal-api listening on {}", config.bind_addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Wait for the running job to finish before exiting
    let _ = shutdown.send(());
    timers.await?;
    worker.await?;
    tracing::info!("bal-api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
