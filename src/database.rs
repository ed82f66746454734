//! Postgres pool backing the social graph store
//!
//! Statements are logged through `log` at debug, slow ones at warn.

use serde::Serialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::DatabaseConfig;
use crate::error::{Error, Result};

/// Statements slower than this are logged at warn level
const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_secs(1);

/// Shared handle to the social graph pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    max_connections: u32,
}

/// Pool occupancy, reported by `/health`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
    pub max_connections: u32,
}

/// Result of a successful round trip to the database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolHealth {
    #[serde(flatten)]
    pub stats: PoolStats,
    pub latency_ms: u64,
}

impl Database {
    #[instrument(skip(config))]
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let pool = create_pool(config).await?;
        Ok(Self {
            pool,
            max_connections: config.max_connections,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round trip `SELECT 1` and report the pool alongside the latency
    pub async fn health_check(&self) -> Result<PoolHealth> {
        let started = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                warn!("Database health check failed: {}", e);
                Error::Database {
                    message: "health check failed".into(),
                    source: Some(e),
                }
            })?;

        Ok(PoolHealth {
            stats: self.stats(),
            latency_ms: started.elapsed().as_millis() as u64,
        })
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max_connections: self.max_connections,
        }
    }

    pub async fn close(&self) {
        info!("Closing social graph pool...");
        self.pool.close().await;
        info!("Social graph pool closed");
    }
}

/// Parse the URL and attach statement cache and logging settings
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let options = PgConnectOptions::from_str(&config.url).map_err(|e| Error::Config {
        message: "invalid DATABASE_URL".into(),
        source: Some(Box::new(e)),
    })?;

    Ok(options
        .statement_cache_capacity(config.statement_cache_size)
        .log_statements(log::LevelFilter::Debug)
        .log_slow_statements(log::LevelFilter::Warn, SLOW_STATEMENT_THRESHOLD))
}

/// Open the pool and prove it can serve a query
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    debug!(
        max = config.max_connections,
        min = config.min_connections,
        connect_timeout = ?config.connect_timeout,
        "Creating social graph pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connect_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .connect_with(connect_options(config)?)
        .await
        .map_err(|e| Error::Database {
            message: "failed to open connection pool".into(),
            source: Some(e),
        })?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        "Social graph pool ready ({} of max {} connections open)",
        pool.size(),
        config.max_connections
    );

    Ok(pool)
}

#[instrument(skip(pool))]
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| Error::Migration(e.to_string()))?;

    info!("Database migrations completed successfully");
    Ok(())
}
