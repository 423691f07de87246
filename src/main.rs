//! Disaster Gateway - REST gateway for geospatial disaster reports

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use disaster_gateway::api::{create_router, AppState};
use disaster_gateway::backend::{postgres, PgConnector, PgReportSource};
use disaster_gateway::cache;
use disaster_gateway::config::Config;
use disaster_gateway::logging;
use disaster_gateway::monitor::{ConnectionMonitor, Connector};
use disaster_gateway::shutdown::{self, ExitStatus, ShutdownHandle, ShutdownListener, ShutdownRequest};
use disaster_gateway::tasks::{spawn_cleanup_task, spawn_probe_task};

/// How long a pool checkout may wait before counting as connection loss.
const POOL_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Main entry point for the gateway.
///
/// # Startup Sequence
/// 1. Load configuration and open the log file, if one is configured
/// 2. Initialize tracing subscriber for logging
/// 3. Install SIGINT/SIGTERM handling
/// 4. Verify the backend is reachable, then start the connection monitor
/// 5. Start background sweep and probe tasks
/// 6. Serve HTTP until a shutdown request arrives
/// 7. Flush logs and exit with the requested status
#[tokio::main]
async fn main() {
    let loaded = Config::from_env().and_then(|config| {
        let log_file = logging::open_log_file(&config)?;
        Ok((config, log_file))
    });
    let (config, log_file) = match loaded {
        Ok((config, log_file)) => (Ok(config), log_file),
        Err(e) => (Err(e), None),
    };

    // Defaults to "info" level, can be overridden with LOG_LEVEL or RUST_LOG
    let level = config
        .as_ref()
        .map_or_else(|_| Config::default().log_level, |config| config.log_level.clone());
    let log_guard = logging::init(&level, log_file);

    info!("Starting Disaster Gateway");

    let (shutdown_handle, mut shutdown_listener) = shutdown::channel();
    tokio::spawn(shutdown::watch_signals(shutdown_handle.clone()));

    let (config, flush_timeout) = match config {
        Ok(config) => {
            let flush_timeout = config.shutdown_flush_timeout();
            (Some(config), flush_timeout)
        }
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            shutdown_handle.request(ExitStatus::Failure, e.to_string());
            (None, Config::default().shutdown_flush_timeout())
        }
    };

    let served = match config {
        Some(config) => match run(config, shutdown_handle.clone(), &mut shutdown_listener).await {
            Ok(request) => request,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Fatal error");
                shutdown_handle.request(ExitStatus::Failure, format!("{e:#}"));
                None
            }
        },
        None => None,
    };

    let request = match served {
        Some(request) => request,
        None => shutdown_listener.recv().await.unwrap_or(ShutdownRequest {
            status: ExitStatus::Failure,
            reason: "shutdown channel closed".to_string(),
        }),
    };
    shutdown::terminate(request, flush_timeout, log_guard).await
}

/// Starts every component and serves until a shutdown request arrives.
///
/// Returns the request that stopped the server.
async fn run(
    config: Config,
    shutdown_handle: ShutdownHandle,
    shutdown_listener: &mut ShutdownListener,
) -> anyhow::Result<Option<ShutdownRequest>> {
    info!(
        port = config.server_port,
        pool_size = config.db_pool_size,
        reconnection_attempts = config.reconnection_attempts,
        reconnection_delay_ms = config.reconnection_delay_ms,
        cache_timeout_secs = config.cache_timeout,
        log_directory = ?config.log_directory,
        "Configuration loaded"
    );

    let pool = postgres::create_pool(&config.database_url, config.db_pool_size, POOL_ACQUIRE_TIMEOUT)
        .context("Failed to create connection pool")?;
    let connector: Arc<dyn Connector> = Arc::new(PgConnector::new(config.database_url.clone()));

    connector.connect().await.context("Database connection error")?;
    info!("Backend connection established");

    let monitor = ConnectionMonitor::new(config.monitor_config(), connector, shutdown_handle.clone());
    let failure = monitor.failure_signal();
    let mut background = vec![monitor.spawn()];

    if config.health_check_interval > 0 {
        let interval = Duration::from_secs(config.health_check_interval);
        background.push(spawn_probe_task(pool.clone(), failure.clone(), interval));
    }

    let cache = cache::shared();
    if config.cache_sweep_interval > 0 {
        let interval = Duration::from_secs(config.cache_sweep_interval);
        background.push(spawn_cleanup_task(cache.clone(), interval));
    }

    let source = Arc::new(PgReportSource::new(
        pool,
        config.tables.clone(),
        config.report_limit,
        failure,
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let app = create_router(AppState::new(cache, source, config));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    let request = tokio::select! {
        request = shutdown_listener.recv() => request,
        result = &mut server => {
            let reason = match result {
                Ok(Ok(())) => "HTTP server stopped".to_string(),
                Ok(Err(e)) => format!("HTTP server error: {}", e),
                Err(e) => format!("HTTP server task failed: {}", e),
            };
            error!(reason = %reason, "Server exited unexpectedly");
            shutdown_handle.request(ExitStatus::Failure, reason);
            shutdown_listener.recv().await
        }
    };

    info!("Stopping HTTP server");
    let _ = stop_tx.send(());
    if !server.is_finished() {
        if let Err(e) = server.await {
            warn!(error = %e, "HTTP server task ended abnormally");
        }
    }

    for task in background {
        task.abort();
    }

    Ok(request)
}
