// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::cache::{CacheStatus, SnapshotCache};
use crate::snapshot::Snapshot;

pub const ENV_DEBUG_ROUTES: &str = "DEBUG_ROUTES";

const DASHBOARD_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<SnapshotCache>,
}

impl AppState {
    pub fn new(cache: SnapshotCache) -> Self {
        Self {
            cache: Arc::new(cache),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/", get(dashboard))
        .route("/health", get(health))
        .route("/api/stats", get(get_stats))
        .route("/api/refresh", post(refresh_stats));

    if debug_routes_enabled() {
        router = router.route("/debug/cache", get(debug_cache));
    }

    router.layer(CorsLayer::very_permissive()).with_state(state)
}

fn debug_routes_enabled() -> bool {
    std::env::var(ENV_DEBUG_ROUTES)
        .map(|v| v == "1")
        .unwrap_or(false)
}

#[derive(serde::Serialize)]
struct StatusMessage {
    status: &'static str,
    message: &'static str,
}

#[derive(serde::Deserialize)]
struct StatsQuery {
    #[serde(default)]
    refresh: Option<String>,
}

impl StatsQuery {
    fn force(&self) -> bool {
        self.refresh
            .as_deref()
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

// Must not touch the cache or any backend.
async fn health() -> Json<StatusMessage> {
    Json(StatusMessage {
        status: "ok",
        message: "Service is running",
    })
}

async fn get_stats(
    State(state): State<AppState>,
    Query(q): Query<StatsQuery>,
) -> Json<Arc<Snapshot>> {
    Json(state.cache.get_snapshot(q.force()).await)
}

async fn refresh_stats(State(state): State<AppState>) -> Json<StatusMessage> {
    let snap = state.cache.force_refresh().await;
    info!(generation = snap.generation, "manual refresh of storage stats");
    Json(StatusMessage {
        status: "ok",
        message: "Cache refreshed",
    })
}

async fn debug_cache(State(state): State<AppState>) -> Json<CacheStatus> {
    Json(state.cache.status())
}
