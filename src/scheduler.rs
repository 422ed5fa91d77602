// src/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::SchedulerSettings;
use crate::ingest::{IngestRequest, Ingestor, SourceSelector};

/// Spawn a background job that runs one ingestion pass per interval.
/// The first pass starts immediately.
pub fn spawn_ingest_scheduler(ingestor: Arc<Ingestor>, cfg: SchedulerSettings) -> JoinHandle<()> {
    let req = IngestRequest::new(SourceSelector::parse(&cfg.source), cfg.limit);
    let period = Duration::from_secs(cfg.interval_secs.max(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            counter!("ingest_runs_total").increment(1);

            match ingestor.run(&req).await {
                Ok(report) => tracing::info!(
                    target: "ingest",
                    sources = ?report.sources,
                    stored = report.count,
                    "scheduled ingest tick"
                ),
                Err(e) => tracing::warn!(
                    target: "ingest",
                    error = %e,
                    "scheduled ingest tick failed"
                ),
            }
        }
    })
}
