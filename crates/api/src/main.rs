use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use labelhub_core::config::env_required;
use labelhub_pipeline::{
    Assembler, IngestService, PgCatalog, PgUploadQueue, PipelineConfig, SharedCatalog,
    SharedQueue,
};
use labelhub_storage::StorageConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labelhub_api::config::ServerConfig;
use labelhub_api::router::build_app_router;
use labelhub_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labelhub_api=debug,labelhub_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = ?e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    let pipeline = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let storage_config = StorageConfig::from_env().context("Invalid storage configuration")?;
    let database_url = env_required("DATABASE_URL")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = labelhub_db::create_pool(&database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    labelhub_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    labelhub_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Extraction, staging and cache directories ---
    for dir in [&pipeline.extract_root, &pipeline.staging_root, &pipeline.cache_root] {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // --- Pipeline services ---
    let catalog: SharedCatalog = Arc::new(PgCatalog::new(pool.clone()));
    let queue: SharedQueue = Arc::new(PgUploadQueue::new(pool, pipeline.max_attempts));
    let storage = labelhub_storage::build_gateway(&storage_config).await;

    let state = AppState {
        ingest: IngestService::new(Arc::clone(&catalog), Arc::clone(&queue), pipeline.clone()),
        assembler: Assembler::new(Arc::clone(&catalog), storage, pipeline.clone()),
        catalog,
        queue,
        pipeline: Arc::new(pipeline),
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: std::net::IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
