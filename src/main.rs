//! Order Cache - order ingestion service with a bounded LRU/TTL cache
//!
//! # Startup Sequence
//! 1. Initialize tracing subscriber for logging
//! 2. Load `.env` and configuration from environment variables
//! 3. Connect the durable store and create its schema
//! 4. Build the configured order cache
//! 5. Spawn the ingestion pipeline on the Redis order stream
//! 6. Serve the HTTP API until SIGINT/SIGTERM
//! 7. Stop the pipeline, then close the cache

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use order_cache::api::{create_router, AppState};
use order_cache::cache::build_cache;
use order_cache::config::Config;
use order_cache::pipeline::{IngestionPipeline, PipelineConfig, RedisStreamTransport};
use order_cache::store::{OrderStore, PostgresOrderStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to info for this crate and tower_http, override with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    info!("Starting order cache service");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        port = config.server_port,
        cache_type = ?config.cache.kind,
        capacity = config.cache.capacity,
        stream = %config.stream.stream_name,
        "Configuration loaded"
    );

    let store = PostgresOrderStore::from_config(&config.database)?;
    store
        .ensure_schema()
        .await
        .context("failed to prepare order table")?;
    let store: Arc<dyn OrderStore> = Arc::new(store);

    let cache = build_cache(&config.cache, &config.redis)
        .await
        .context("failed to build order cache")?;

    let transport = RedisStreamTransport::from_url(&config.redis.url, config.stream.clone())?;
    let pipeline = IngestionPipeline::new(
        cache.clone(),
        store,
        PipelineConfig::from(&config.stream),
    );

    let shutdown = CancellationToken::new();
    let consumer = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&transport, shutdown).await {
                error!(error = %e, "Ingestion pipeline stopped");
            }
        })
    };

    let app = create_router(AppState::new(cache.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .context("server error")?;

    shutdown.cancel();
    if let Err(e) = consumer.await {
        error!(error = %e, "Consumer task panicked");
    }
    cache.close().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for Ctrl+C or SIGTERM, or for `shutdown` to be cancelled elsewhere.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating shutdown..."),
        _ = shutdown.cancelled() => {}
    }

    shutdown.cancel();
}
