//! Service Guard - operational server
//!
//! Hosts the cache, rate limiter and task queue behind a small health and
//! metrics HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use service_guard::api::{create_router, AppState};
use service_guard::tasks::spawn_housekeeping_task;
use service_guard::Config;

/// Main entry point for the service guard server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Build cache, rate limiter and task queue once
/// 4. Start queue workers and the housekeeping task
/// 5. Start HTTP server on configured port
/// 6. Handle graceful shutdown on SIGINT/SIGTERM, then stop the queue
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "service_guard=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Service Guard");

    let config = Config::from_env();
    info!(
        "Configuration loaded: distributed_cache={}, max_entries={}, default_ttl={}s, workers={}, port={}",
        config.redis_url.is_some(),
        config.cache_max_entries,
        config.cache_default_ttl,
        config.queue_workers,
        config.server_port
    );

    // Connecting to Redis may block for the handshake timeout
    let state = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || AppState::from_config(&config)).await?
    };
    info!(
        distributed = state.cache.is_distributed(),
        "Cache initialized"
    );

    state.queue.start(config.queue_workers);

    let housekeeping_handle = spawn_housekeeping_task(
        Arc::clone(&state.limiter),
        Arc::clone(&state.queue),
        config.housekeeping_interval(),
        config.bucket_max_age(),
        config.task_retention(),
    );
    info!("Background housekeeping task started");

    let queue = Arc::clone(&state.queue);
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(housekeeping_handle))
        .await?;

    // Joining workers blocks for up to the configured shutdown timeout
    tokio::task::spawn_blocking(move || queue.stop()).await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the housekeeping task and allows graceful shutdown.
async fn shutdown_signal(housekeeping_handle: tokio::task::JoinHandle<()>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
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

    housekeeping_handle.abort();
    warn!("Housekeeping task aborted");
}
