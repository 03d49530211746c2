//! asyncjobs API server

use asyncjobs_api::{AppState, routes};
use asyncjobs_config::{StoreBackend, SystemConfig};
use asyncjobs_db::{InMemoryJobRepo, JobRepo, PgJobRepo, create_pool, ensure_schema};
use asyncjobs_executor::{FailureRecorder, JobExecutor};
use asyncjobs_scheduler::{JobQueue, Worker, WorkerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asyncjobs-server")]
#[command(about = "Asynchronous job processing API", long_about = None)]
struct Args {
    /// Path to a KDL configuration file
    #[arg(long, env = "ASYNCJOBS_CONFIG")]
    config: Option<PathBuf>,
}

async fn connect_store(config: &SystemConfig) -> anyhow::Result<Arc<dyn JobRepo>> {
    match config.store.backend {
        StoreBackend::Memory => {
            info!("Using in-memory job store");
            Ok(Arc::new(InMemoryJobRepo::new()))
        }
        StoreBackend::Postgres => {
            let url = config
                .store
                .url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("store.url is required for postgres"))?;
            info!(table = %config.store.table, "Connecting to database...");
            let pool = create_pool(url).await?;
            ensure_schema(&pool, &config.store.table).await?;
            info!("Database connected");
            Ok(Arc::new(PgJobRepo::new(pool, config.store.table.clone())))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SystemConfig::load(args.config.as_deref())?;
    info!(
        timeout = config.executor.timeout,
        max_concurrency = config.executor.max_concurrency,
        retry_attempts = config.dispatch.retry_attempts,
        "Loaded configuration"
    );

    let repo = connect_store(&config).await?;

    // Executor, failure recorder and worker
    let executor = Arc::new(JobExecutor::new(repo.clone(), config.executor.timeout));
    let recorder = Arc::new(FailureRecorder::new(repo.clone()));
    let worker = Worker::new(executor, recorder, WorkerConfig::from(&config));
    let (queue, receiver) = JobQueue::new();
    let worker_handle = tokio::spawn(async move { worker.run(receiver).await });

    let state = AppState::new(repo, queue);
    let app = routes::router(state).layer(TraceLayer::new_for_http());

    info!("Starting server on {}", config.server.bind);
    let listener = TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue sender; the worker now drains and stops.
    worker_handle.await?;
    Ok(())
}
