//! Worker entry point.

use std::sync::Arc;

use forge::{ForgeEngine, InMemoryProvider, ProviderRegistry};
use provider_aws::{AwsIamFactory, PROVIDER};
use superkey::PipelineCatalog;
use tokio::signal;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{Config, Dispatcher, HttpSystemOfRecord, LogFormat, ProviderMode, WorkerPool};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn provider_registry(config: &Config) -> ProviderRegistry {
    match config.provider_mode {
        ProviderMode::Aws => ProviderRegistry::new()
            .with(PROVIDER, AwsIamFactory::new(&config.aws_region).await),
        ProviderMode::Memory => {
            tracing::warn!("using in-memory provider, no cloud resources will be created");
            ProviderRegistry::new().with(PROVIDER, InMemoryProvider::named(PROVIDER))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Configuration and tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Forge engine and system of record
    let engine = ForgeEngine::new(PipelineCatalog::builtin()?, provider_registry(&config).await);
    let reporter = HttpSystemOfRecord::new(&config.sources_api_url, config.sources_api_timeout)?;
    let dispatcher = Arc::new(Dispatcher::new(engine, reporter));

    // 4. Worker pool behind a bounded queue
    let (queue, events) = mpsc::channel(config.queue_capacity);
    let pool = tokio::spawn(WorkerPool::new(dispatcher, config.concurrency).run(events));

    // 5. Serve ingest, health and metrics
    let app = worker::create_app(queue, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting superkey worker");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last sender; the pool drains and stops.
    let handled = pool.await?;
    tracing::info!(handled, "worker shut down gracefully");
    Ok(())
}
