use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use labelhub_pipeline::{PgUploadQueue, PipelineConfig, SharedQueue};
use labelhub_storage::StorageConfig;
use labelhub_worker::{reaper, spawn_workers, WorkerConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labelhub_worker=debug,labelhub_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "Worker failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = WorkerConfig::from_env().context("Invalid worker configuration")?;
    let pipeline = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let storage_config = StorageConfig::from_env().context("Invalid storage configuration")?;
    tracing::info!(
        concurrency = config.concurrency,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        staging_root = %pipeline.staging_root.display(),
        "Loaded worker configuration"
    );

    // --- Database ---
    let pool = labelhub_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    labelhub_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    labelhub_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Queue and storage ---
    let queue: SharedQueue = Arc::new(PgUploadQueue::new(pool, pipeline.max_attempts));
    let storage = labelhub_storage::build_gateway(&storage_config).await;

    // --- Workers ---
    let cancel = CancellationToken::new();
    let instance_id = uuid::Uuid::new_v4().simple().to_string();
    let workers = spawn_workers(
        &instance_id,
        config.concurrency,
        Arc::clone(&queue),
        storage,
        config.poll_interval,
        cancel.clone(),
    );
    let reaper_handle = tokio::spawn(reaper::run(
        queue,
        config.visibility_timeout,
        cancel.clone(),
    ));
    tracing::info!(instance_id = %instance_id, workers = workers.len(), "Worker pool started");

    shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!("Shutdown requested, waiting for in-flight uploads");
    workers.shutdown().await;
    let _ = tokio::time::timeout(Duration::from_secs(5), reaper_handle).await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
