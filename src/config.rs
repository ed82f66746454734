//! Configuration management for the FriendGraph engine
//!
//! Provides strongly-typed configuration with validation, environment variable parsing,
//! and sensible defaults.
//!
//! # Example
//! ```no_run
//! use friendgraph::Config;
//! let config = Config::from_env().expect("failed to load config");
//! println!("max depth: {}", config.recommendation.max_depth);
//! ```

use crate::error::{Error, Result};
use std::time::Duration;
use tracing::info;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database configuration (social graph, conversations, likes, profiles)
    pub database: DatabaseConfig,
    /// API server configuration
    pub api: ApiConfig,
    /// Recommendation engine configuration
    pub recommendation: RecommendationConfig,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Minimum connections to keep open
    pub min_connections: u32,
    /// Connection timeout
    pub connect_timeout: Duration,
    /// Idle timeout for connections
    pub idle_timeout: Duration,
    /// Maximum lifetime for connections
    pub max_lifetime: Duration,
    /// Enable statement caching
    pub statement_cache_size: usize,
    /// Run embedded migrations on startup
    pub run_migrations: bool,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Port to listen on
    pub port: u16,
    /// Host to bind to
    pub host: String,
    /// Request timeout
    pub request_timeout: Duration,
    /// Enable CORS
    pub cors_enabled: bool,
    /// Prometheus scrape port (only used with the `metrics` feature)
    pub metrics_port: u16,
}

/// Recommendation engine configuration
#[derive(Debug, Clone)]
pub struct RecommendationConfig {
    /// Weighted-distance bound for the social distance search
    pub max_depth: i32,
    /// Page size used when the caller does not pass one
    pub default_page_size: i64,
    /// Upper bound on accepted page sizes
    pub max_page_size: i64,
    /// Deadline for a single social distance search
    pub search_timeout: Duration,
    /// TTL of the API-level page cache (zero disables it)
    pub cache_ttl: Duration,
    /// Most pages the API cache holds before evicting the least recently used
    pub cache_capacity: usize,
    /// Requests slower than this are logged at warn level
    pub slow_request_threshold: Duration,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            default_page_size: 20,
            max_page_size: 100,
            search_timeout: Duration::from_millis(2000),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 10_000,
            slow_request_threshold: Duration::from_millis(200),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Prefer loading env from a directory of files (FFOLDER) for platforms that mount secrets as files.
        // Each file name is the env var name and its contents is the value.
        if let Ok(folder) = std::env::var("FFOLDER") {
            load_env_folder(&folder);
        } else {
            // Try to load .env file (ignore if not found)
            dotenvy::dotenv().ok();
        }

        let config = Self {
            database: DatabaseConfig::from_env()?,
            api: ApiConfig::from_env()?,
            recommendation: RecommendationConfig::from_env()?,
        };

        config.validate()?;
        config.log_summary();

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.database.max_connections < self.database.min_connections {
            return Err(Error::InvalidConfig {
                key: "DB_MAX_CONNECTIONS",
                message: "max_connections must be >= min_connections".into(),
            });
        }

        let rec = &self.recommendation;
        if rec.max_depth < 0 {
            return Err(Error::InvalidConfig {
                key: "REC_MAX_DEPTH",
                message: format!("max depth must be >= 0, got {}", rec.max_depth).into(),
            });
        }
        if rec.default_page_size <= 0 || rec.default_page_size > rec.max_page_size {
            return Err(Error::InvalidConfig {
                key: "REC_DEFAULT_PAGE_SIZE",
                message: format!(
                    "default page size must be in 1..={}, got {}",
                    rec.max_page_size, rec.default_page_size
                )
                .into(),
            });
        }
        if rec.search_timeout.is_zero() {
            return Err(Error::InvalidConfig {
                key: "REC_SEARCH_TIMEOUT_MS",
                message: "search timeout must be positive".into(),
            });
        }

        Ok(())
    }

    /// Log configuration summary (without sensitive data)
    fn log_summary(&self) {
        info!("Configuration loaded:");
        info!("  Database:");
        info!("    URL: {}", mask_url(&self.database.url));
        info!(
            "    Pool Size: {}-{}",
            self.database.min_connections, self.database.max_connections
        );
        info!("  API:");
        info!("    Listening on: {}:{}", self.api.host, self.api.port);
        info!("  Recommendations:");
        info!("    Max Depth: {}", self.recommendation.max_depth);
        info!(
            "    Page Size: {} (max {})",
            self.recommendation.default_page_size, self.recommendation.max_page_size
        );
        info!("    Search Timeout: {:?}", self.recommendation.search_timeout);
        info!(
            "    Cache: TTL {:?}, capacity {}",
            self.recommendation.cache_ttl, self.recommendation.cache_capacity
        );
    }
}

impl DatabaseConfig {
    fn from_env() -> Result<Self> {
        let url = get_env("DATABASE_URL").unwrap_or_else(|_| {
            let user = std::env::var("USER").unwrap_or_else(|_| "postgres".to_string());
            format!("postgres://{}@localhost/friendgraph_dev", user)
        });

        Ok(Self {
            url,
            max_connections: get_env_or("DB_MAX_CONNECTIONS", "20").parse().unwrap_or(20),
            min_connections: get_env_or("DB_MIN_CONNECTIONS", "5").parse().unwrap_or(5),
            connect_timeout: Duration::from_secs(
                get_env_or("DB_CONNECT_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            idle_timeout: Duration::from_secs(
                get_env_or("DB_IDLE_TIMEOUT_SECS", "600")
                    .parse()
                    .unwrap_or(600),
            ),
            max_lifetime: Duration::from_secs(
                get_env_or("DB_MAX_LIFETIME_SECS", "3600")
                    .parse()
                    .unwrap_or(3600),
            ),
            statement_cache_size: get_env_or("DB_STATEMENT_CACHE_SIZE", "100")
                .parse()
                .unwrap_or(100),
            run_migrations: get_env_or("DB_RUN_MIGRATIONS", "true")
                .parse()
                .unwrap_or(true),
        })
    }
}

impl ApiConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            port: get_env_or("API_PORT", "8080").parse().unwrap_or(8080),
            host: get_env_or("API_HOST", "0.0.0.0"),
            request_timeout: Duration::from_secs(
                get_env_or("API_REQUEST_TIMEOUT_SECS", "30")
                    .parse()
                    .unwrap_or(30),
            ),
            cors_enabled: get_env_or("API_CORS_ENABLED", "true")
                .parse()
                .unwrap_or(true),
            metrics_port: get_env_or("METRICS_PORT", "9090").parse().unwrap_or(9090),
        })
    }
}

impl RecommendationConfig {
    fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_depth: get_env_parsed_or("REC_MAX_DEPTH", defaults.max_depth)?,
            default_page_size: get_env_parsed_or(
                "REC_DEFAULT_PAGE_SIZE",
                defaults.default_page_size,
            )?,
            max_page_size: get_env_parsed_or("REC_MAX_PAGE_SIZE", defaults.max_page_size)?,
            search_timeout: Duration::from_millis(get_env_parsed_or(
                "REC_SEARCH_TIMEOUT_MS",
                defaults.search_timeout.as_millis() as u64,
            )?),
            cache_ttl: Duration::from_secs(get_env_parsed_or(
                "REC_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            cache_capacity: get_env_parsed_or("REC_CACHE_CAPACITY", defaults.cache_capacity)?,
            slow_request_threshold: Duration::from_millis(
                get_env_or("REC_SLOW_REQUEST_MS", "200")
                    .parse()
                    .unwrap_or(200),
            ),
        })
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Populate unset environment variables from a directory of files
fn load_env_folder(folder: &str) {
    let path = std::path::Path::new(folder);
    if !path.is_dir() {
        return;
    }

    match std::fs::read_dir(path) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let Ok(name) = entry.file_name().into_string() else {
                    continue;
                };
                let file = entry.path();
                if !file.is_file() {
                    continue;
                }
                if let Ok(contents) = std::fs::read_to_string(&file) {
                    // Only set env var if not already set in the environment
                    if std::env::var(&name).is_err() {
                        std::env::set_var(&name, contents.trim());
                    }
                }
            }
            info!("Loaded configuration from FFOLDER={}", folder);
        }
        Err(err) => {
            tracing::warn!("Failed to read FFOLDER {}: {}", folder, err);
        }
    }
}

/// Get required environment variable
fn get_env(key: &'static str) -> Result<String> {
    std::env::var(key).map_err(|_| Error::MissingEnvVar { var: key })
}

/// Get environment variable with default
fn get_env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an optional environment variable; a present but malformed value is an error
fn get_env_parsed_or<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|e: T::Err| Error::InvalidConfig {
            key,
            message: format!("Invalid value '{}': {}", value, e).into(),
        }),
        Err(_) => Ok(default),
    }
}

/// Mask sensitive parts of URL
fn mask_url(url: &str) -> String {
    // Mask password if present
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            // scheme separator, no password present
            if url[colon_pos + 1..].starts_with("//") {
                return url.to_string();
            }
            return format!("{}****{}", &url[..=colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database: DatabaseConfig {
                url: "postgres://localhost/friendgraph_test".to_string(),
                max_connections: 5,
                min_connections: 1,
                connect_timeout: Duration::from_secs(5),
                idle_timeout: Duration::from_secs(60),
                max_lifetime: Duration::from_secs(300),
                statement_cache_size: 10,
                run_migrations: false,
            },
            api: ApiConfig {
                port: 8080,
                host: "127.0.0.1".to_string(),
                request_timeout: Duration::from_secs(30),
                cors_enabled: false,
                metrics_port: 9090,
            },
            recommendation: RecommendationConfig::default(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(base_config().validate().is_ok());
        assert_eq!(RecommendationConfig::default().max_depth, 3);
    }

    #[test]
    fn test_validate_rejects_negative_depth() {
        let mut config = base_config();
        config.recommendation.max_depth = -1;
        assert!(matches!(
            config.validate(),
            Err(Error::InvalidConfig { key: "REC_MAX_DEPTH", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_oversized_default_page() {
        let mut config = base_config();
        config.recommendation.default_page_size = 500;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mask_url() {
        assert_eq!(
            mask_url("postgres://user:secret@db:5432/app"),
            "postgres://user:****@db:5432/app"
        );
        assert_eq!(
            mask_url("postgres://user@db/app"),
            "postgres://user@db/app"
        );
    }
}
