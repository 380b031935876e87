//! Favicon Cache - operational server
//!
//! Opens the configured cache backend and serves the operational API.

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use favicon_cache::api::{create_router, AppState};
use favicon_cache::cache::build_cache;
use favicon_cache::config::{Config, MaintenanceMode};
use favicon_cache::tasks::spawn_maintenance_task;

/// Main entry point for the favicon cache server.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from `FAVICON_CONFIG` (TOML) or environment variables
/// 3. Open the cache backend
/// 4. Start background maintenance task when configured
/// 5. Create Axum router with all endpoints
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "favicon_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting favicon cache server");

    let config = load_config()?;
    info!(
        "Configuration loaded: db_type={}, db_url={}, hold_time={}s, limit_total_bytes={}, blob_max_bytes={}, maintenance={} every {}s, port={}",
        config.db_type,
        config.db_url.display(),
        config.hold_time,
        config.limit_total_bytes,
        config.blob_max_bytes,
        config.maintenance_mode,
        config.maintenance_period,
        config.server_port
    );

    let cache = build_cache(&config)
        .await
        .context("failed to open favicon cache")?;
    info!("Favicon cache initialized ({})", cache.backend_kind());

    let maintenance_handle = if config.maintenance_mode == MaintenanceMode::Background {
        let handle = spawn_maintenance_task(cache.clone(), config.maintenance_period);
        info!("Background maintenance task started");
        Some(handle)
    } else {
        None
    };

    let app = create_router(AppState::new(cache));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(maintenance_handle))
        .await
        .context("server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Reads the TOML file named by `FAVICON_CONFIG`, or falls back to
/// environment variables.
fn load_config() -> anyhow::Result<Config> {
    match std::env::var("FAVICON_CONFIG") {
        Ok(path) => Config::from_toml_file(&path)
            .with_context(|| format!("failed to load favicon config from {}", path)),
        Err(_) => Config::from_env().context("invalid favicon cache environment"),
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the maintenance task if one is running.
async fn shutdown_signal(maintenance_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
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

    if let Some(handle) = maintenance_handle {
        handle.abort();
        warn!("Maintenance task aborted");
    }
}
