//! Arbitrage Engine: binary entrypoint
//! Boots the Axum HTTP server: source adapters, in-memory store, optional
//! scheduled ingestion and the Prometheus endpoint.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use arbitrage_engine::config::IngestConfig;
use arbitrage_engine::ingest::http::{HttpFetch, ReqwestFetcher};
use arbitrage_engine::ingest::providers::build_registry;
use arbitrage_engine::metrics::Metrics;
use arbitrage_engine::scheduler::spawn_ingest_scheduler;
use arbitrage_engine::store::{InMemoryStore, OpportunityStore};
use arbitrage_engine::{create_router, AppState, Ingestor};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - ARBITRAGE_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("ARBITRAGE_DEV_LOG")
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

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));

    // Shuttle may already own the global subscriber.
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

    let cfg = IngestConfig::from_env()?;
    tracing::info!(target: "ingest", config = ?cfg, "ingest config loaded");

    let http: Arc<dyn HttpFetch> = Arc::new(
        ReqwestFetcher::new(&cfg.http.user_agent).map_err(|e| anyhow::anyhow!(e))?,
    );
    let adapters = build_registry(&cfg, http);
    let store: Arc<dyn OpportunityStore> = Arc::new(InMemoryStore::new());
    let ingestor = Arc::new(Ingestor::new(adapters, store));

    if cfg.scheduler.enabled {
        spawn_ingest_scheduler(Arc::clone(&ingestor), cfg.scheduler.clone());
    }

    let mut router = create_router(AppState::new(ingestor, cfg.default_limit));
    match Metrics::init() {
        Ok(m) => router = router.merge(m.router()),
        Err(e) => tracing::warn!(error = %e, "prometheus recorder not installed"),
    }

    Ok(router.into())
}
