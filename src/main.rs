//! Cache Core server
//!
//! Serves the configured cache backend over HTTP.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cache_core::api::create_router;
use cache_core::{spawn_gc_task, AppState, CacheManager, Config};

/// Main entry point for the cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build and initialize the selected adapter
/// 4. Start the background gc task when enabled
/// 5. Serve the HTTP API until SIGINT/SIGTERM
/// 6. Close the adapter so persistent backends flush their state
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cache_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting cache server");

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        adapter = %config.adapter,
        prefix = config.prefix(),
        port = config.server_port,
        gc_interval = config.gc_interval,
        "configuration loaded"
    );

    let manager = CacheManager::from_config(&config)
        .await
        .context("failed to build cache adapter")?;
    manager.init().await.context("failed to initialize cache adapter")?;

    let gc_handle = (config.gc_interval > 0)
        .then(|| spawn_gc_task(manager.clone(), config.gc_interval, config.gc_max_lifetime));

    let app = create_router(AppState::new(manager.clone()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(gc_handle))
        .await
        .context("server error")?;

    match manager.close().await {
        Ok(true) => info!("cache closed"),
        Ok(false) => warn!("cache state could not be fully flushed"),
        Err(err) => warn!(error = %err, "failed to close cache"),
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM), then stops the gc task.
async fn shutdown_signal(gc_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
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

    if let Some(handle) = gc_handle {
        handle.abort();
        info!("gc task aborted");
    }
}
