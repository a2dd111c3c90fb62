// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod aggregator;
pub mod api;
pub mod cache;
pub mod config;
pub mod snapshot;
pub mod sources;

use std::sync::Arc;

use tracing::info;

pub use crate::aggregator::{Aggregator, DynBackendClient};
pub use crate::api::{create_router, AppState};
pub use crate::cache::SnapshotCache;
pub use crate::config::AggregatorConfig;
pub use crate::snapshot::Snapshot;

use crate::sources::{DocumentStoreClient, MongoStore, RelationalServiceClient};

/// Production backend clients for `cfg`: document store first, relational second.
pub fn backend_clients(cfg: &AggregatorConfig) -> Vec<DynBackendClient> {
    let mongo = MongoStore::new(
        cfg.mongodb_uri.clone(),
        cfg.mongodb_db.clone(),
        cfg.mongodb_connect_timeout(),
    );
    let documents = DocumentStoreClient::new(Arc::new(mongo))
        .with_excluded_databases(cfg.mongodb_excluded_dbs.clone());
    let relational = RelationalServiceClient::new(&cfg.sqlite_service, cfg.sqlite_timeout());

    vec![Arc::new(documents), Arc::new(relational)]
}

/// Shared state with production clients. Does no I/O.
pub fn build_state(cfg: &AggregatorConfig) -> AppState {
    info!(
        sqlite_service = %cfg.sqlite_service,
        mongodb_uri = %sources::mongo::redact(&cfg.mongodb_uri),
        mongodb_db = %cfg.mongodb_db,
        ttl_secs = cfg.cache_ttl_secs,
        "storage stats aggregator configured"
    );
    let aggregator = Aggregator::new(backend_clients(cfg));
    AppState::new(SnapshotCache::new(Arc::new(aggregator), cfg.cache_ttl()))
}

/// Full router from env/file configuration.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = AggregatorConfig::load()?;
    Ok(create_router(build_state(&cfg)))
}
