//! HTTP API Server for Friend Recommendations
//!
//! Exposes the recommendation service over REST and keeps a short-lived page
//! cache in front of it. The engine itself never caches.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::database::{Database, PoolHealth, PoolStats};
use crate::error::Result;
use crate::recommendation::{
    ConnectionStrengthReport, Page, PageRequest, Recommendation, RecommendationService, UserId,
};

type CacheKey = (UserId, i64, i64);

/// Recommendation pages keyed by `(user, page, size)`.
///
/// Entries expire after the TTL; once full, the least recently used page is
/// evicted. A zero TTL or zero capacity disables the cache.
pub struct PageCache {
    ttl: Duration,
    entries: Option<Mutex<LruCache<CacheKey, (Instant, Page<Recommendation>)>>>,
}

impl PageCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let entries = NonZeroUsize::new(capacity)
            .filter(|_| !ttl.is_zero())
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        Self { ttl, entries }
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub async fn get(&self, user: UserId, page: &PageRequest) -> Option<Page<Recommendation>> {
        let mut entries = self.entries.as_ref()?.lock().await;
        let key = (user, page.page, page.size);

        let expired = entries
            .peek(&key)
            .map(|(stored_at, _)| stored_at.elapsed() >= self.ttl)?;
        if expired {
            entries.pop(&key);
            return None;
        }
        entries.get(&key).map(|(_, cached)| cached.clone())
    }

    pub async fn insert(&self, user: UserId, page: &PageRequest, value: Page<Recommendation>) {
        if let Some(entries) = &self.entries {
            entries
                .lock()
                .await
                .put((user, page.page, page.size), (Instant::now(), value));
        }
    }

    pub async fn len(&self) -> usize {
        match &self.entries {
            Some(entries) => entries.lock().await.len(),
            None => 0,
        }
    }
}

/// Shared application state
pub struct ApiState {
    pub service: RecommendationService,
    pub cache: PageCache,
    pub database: Database,
}

impl ApiState {
    pub fn new(service: RecommendationService, database: Database) -> Self {
        let config = service.config();
        let cache = PageCache::new(config.cache_ttl, config.cache_capacity);
        Self {
            service,
            cache,
            database,
        }
    }
}

/// Query params for the recommendations endpoint
#[derive(Debug, Deserialize)]
pub struct RecommendationsQuery {
    #[serde(default)]
    pub page: i64,
    pub size: Option<i64>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: DatabaseStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseStatus {
    pub connected: bool,
    #[serde(flatten)]
    pub pool: PoolStats,
    pub latency_ms: Option<u64>,
}

/// 200 when the database answered, 503 otherwise
fn health_response(check: Result<PoolHealth>, stats: PoolStats) -> (StatusCode, HealthResponse) {
    let (status, database) = match check {
        Ok(health) => (
            StatusCode::OK,
            DatabaseStatus {
                connected: true,
                pool: health.stats,
                latency_ms: Some(health.latency_ms),
            },
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            DatabaseStatus {
                connected: false,
                pool: stats,
                latency_ms: None,
            },
        ),
    };

    let body = HealthResponse {
        status: if status == StatusCode::OK { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        database,
    };
    (status, body)
}

/// Build the router
pub fn router(state: Arc<ApiState>, config: &ApiConfig) -> Router {
    let mut app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Recommendations
        .route(
            "/api/v1/users/:user_id/friend-recommendations",
            get(get_friend_recommendations),
        )
        .route(
            "/api/v1/users/:user_id/connection-strength/:other_id",
            get(get_connection_strength),
        )
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(TraceLayer::new_for_http());

    if config.cors_enabled {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app.with_state(state)
}

/// Start the API server
pub async fn start_server(state: Arc<ApiState>, config: ApiConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let app = router(state, &config);

    info!("Starting friend recommendation API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_check(State(state): State<Arc<ApiState>>) -> (StatusCode, Json<HealthResponse>) {
    let check = state.database.health_check().await;
    let (status, body) = health_response(check, state.database.stats());
    (status, Json(body))
}

/// Ranked friend recommendations for a user
async fn get_friend_recommendations(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<RecommendationsQuery>,
) -> Result<Json<Page<Recommendation>>> {
    let user = UserId(user_id);
    let request = PageRequest::new(
        query.page,
        query.size.unwrap_or(state.service.config().default_page_size),
    );

    if let Some(cached) = state.cache.get(user, &request).await {
        debug!("Serving cached recommendations for user {}", user);
        return Ok(Json(cached));
    }

    let page = state
        .service
        .get_friend_recommendations(user, request)
        .await?;
    state.cache.insert(user, &request, page.clone()).await;

    Ok(Json(page))
}

/// Per-factor explanation of the tie between two users
async fn get_connection_strength(
    State(state): State<Arc<ApiState>>,
    Path((user_id, other_id)): Path<(i64, i64)>,
) -> Result<Json<ConnectionStrengthReport>> {
    let report = state
        .service
        .connection_strength(UserId(user_id), UserId(other_id))
        .await?;
    Ok(Json(report))
}
