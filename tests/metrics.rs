// tests/metrics.rs
use std::sync::Arc;

use arbitrage_engine::config::IngestConfig;
use arbitrage_engine::ingest::http::FixtureFetcher;
use arbitrage_engine::ingest::providers::build_registry;
use arbitrage_engine::ingest::{IngestRequest, Ingestor, SourceSelector};
use arbitrage_engine::metrics::Metrics;
use arbitrage_engine::store::InMemoryStore;
use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use tower::ServiceExt as _;

#[tokio::test]
async fn metrics_exposed_after_ingest() {
    let metrics = Metrics::init().expect("recorder");

    // no fixtures: github fails, the keyless sources emit placeholders
    let http = Arc::new(FixtureFetcher::new());
    let ingestor = Ingestor::new(
        build_registry(&IngestConfig::default(), http),
        Arc::new(InMemoryStore::new()),
    );
    let report = ingestor
        .run(&IngestRequest::new(SourceSelector::All, 5))
        .await
        .expect("placeholders are stored");
    assert!(report.count >= 4);

    let out = metrics.handle.render();
    assert!(out.contains("ingest_candidates_total"));
    assert!(out.contains("ingest_fallback_records_total"));
    assert!(out.contains("ingest_source_failures_total"));
    assert!(out.contains("ingest_source_fetch_ms"));
    assert!(out.contains("ingest_stored_total"));

    let app: axum::Router = metrics.router();
    let resp = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("ingest_stored_total"));
}
