//! FriendGraph Engine
//!
//! Friend recommendation service over a Postgres-backed social graph.
//!
//! # Graceful Shutdown
//!
//! SIGTERM and SIGINT stop the API server and close the connection pool.

use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use friendgraph::api::{self, ApiState};
use friendgraph::config::{ApiConfig, Config};
use friendgraph::database::{self, Database};
use friendgraph::error::Result;
use friendgraph::recommendation::{PgSocialStore, RecommendationService, SocialProviders};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("FriendGraph Engine v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!("Configuration loaded and validated");

    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    #[cfg(feature = "metrics")]
    init_metrics_exporter(config.api.metrics_port)?;

    let db = Database::new(&config.database).await?;
    info!("Database connection pool established");

    if config.database.run_migrations {
        database::run_migrations(db.pool()).await?;
    }

    let store = Arc::new(PgSocialStore::new(db.pool().clone()));
    let service = RecommendationService::new(
        SocialProviders::from_store(store),
        config.recommendation.clone(),
    );
    let state = Arc::new(ApiState::new(service, db.clone()));

    let mut handles = vec![spawn_api_server(
        state,
        config.api.clone(),
        shutdown_tx.subscribe(),
    )];

    info!(
        "API listening on http://{}:{} (health: /health)",
        config.api.host, config.api.port
    );

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        _ = wait_for_any_failure(&mut handles) => {
            warn!("A service stopped unexpectedly, initiating shutdown");
        }
    }

    let _ = shutdown_tx.send(());

    let shutdown_timeout = Duration::from_secs(30);
    if tokio::time::timeout(shutdown_timeout, shutdown_services(handles))
        .await
        .is_err()
    {
        warn!("Shutdown timeout exceeded, forcing exit");
    }

    db.close().await;

    info!("FriendGraph Engine stopped");
    Ok(())
}

/// Initialize structured logging with tracing
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "friendgraph_engine=debug,friendgraph=debug,tower_http=debug,sqlx=warn,info",
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .init();
}

#[cfg(feature = "metrics")]
fn init_metrics_exporter(port: u16) -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| friendgraph::Error::config(format!("Prometheus exporter: {}", e)))?;

    info!("Prometheus metrics exposed on port {}", port);
    Ok(())
}

/// Spawn the API server
fn spawn_api_server(
    state: Arc<ApiState>,
    config: ApiConfig,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = api::start_server(state, config) => {
                if let Err(e) = result {
                    error!("API server error: {:?}", e);
                }
            }
            _ = shutdown_rx.recv() => {
                info!("API server shutting down");
            }
        }
    })
}

/// Wait for any task to finish
async fn wait_for_any_failure(handles: &mut [tokio::task::JoinHandle<()>]) {
    loop {
        if handles.iter().any(|handle| handle.is_finished()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Wait for all services to complete shutdown
async fn shutdown_services(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
