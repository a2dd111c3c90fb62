//! Storage Stats Aggregator: binary entrypoint.
//! Boots the Axum HTTP server: config from env, backend clients, TTL cache, routes.

use shuttle_axum::ShuttleAxum;
use storage_stats_aggregator::{build_state, create_router, AggregatorConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Compact local logs. Requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - STATS_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("STATS_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("storage_stats_aggregator=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let cfg = AggregatorConfig::load()?;
    let router = create_router(build_state(&cfg));

    Ok(router.into())
}
