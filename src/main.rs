//! Caching Proxy - A development-time reverse proxy
//!
//! Forwards GET requests to a fixed upstream host and caches successful
//! responses in memory or Redis.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use caching_proxy::api::create_router;
use caching_proxy::storage::{open_connection, InMemoryStorage, RedisStorage, StorageBackend};
use caching_proxy::{AppState, Cache, Config};

/// Main entry point for the caching proxy.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Open the selected storage backend
/// 4. Start the cache (one sweep now, then periodically)
/// 5. Create Axum router
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "caching_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Caching Proxy");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        "Configuration loaded: upstream={}, dev_host={}, port={}, ssl_port={}, db_caching={}",
        config.host, config.dev_host, config.port, config.ssl_port, config.use_db_caching
    );

    // Pick the storage backend
    let backend: Arc<dyn StorageBackend> = if config.use_db_caching {
        let conn = open_connection(&config.redis_url, config.redis_db)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis_url))?;
        Arc::new(RedisStorage::new(conn))
    } else {
        Arc::new(InMemoryStorage::new())
    };

    let cache = Cache::start(
        backend,
        config.cache,
        Duration::from_secs(config.gc_interval),
    )
    .await;

    let state = AppState::from_config(&config, cache.clone())?;
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "Server listening on http://{} (HTTPS expected on port {} via TLS front end)",
        addr, config.ssl_port
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cache))
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the cache sweep.
async fn shutdown_signal(cache: Arc<Cache>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cache.stop_sweep();
    warn!("Cache sweep stopped");
}
