// src/ingest/mod.rs
pub mod http;
pub mod normalize;
pub mod providers;
pub mod types;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::error::{FetchError, IngestError, SourceFailure};
use crate::ingest::types::{CandidateRecord, SourceAdapter, SourceId};
use crate::store::{OpportunityStore, RunOutcome, ScoredRecord, StoredOpportunity};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "ingest_candidates_total",
            "Candidate records returned by adapters."
        );
        describe_counter!(
            "ingest_fallback_records_total",
            "Placeholder records emitted instead of live data."
        );
        describe_counter!(
            "ingest_source_failures_total",
            "Adapter fetches that failed or timed out."
        );
        describe_counter!(
            "ingest_batch_dedup_total",
            "Candidates dropped for repeating a source_url within one pass."
        );
        describe_counter!("ingest_stored_total", "Records upserted into storage.");
        describe_counter!("ingest_runs_total", "Scheduled ingestion passes started.");
        describe_counter!(
            "ingest_audit_write_errors_total",
            "Run outcome rows that could not be written."
        );
        describe_histogram!("ingest_source_fetch_ms", "Adapter fetch time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when ingest pipeline last ran."
        );
    });
}

/// Which sources a pass should run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceSelector {
    All,
    Named(String),
}

impl SourceSelector {
    pub fn parse(s: &str) -> Self {
        let t = s.trim();
        if t.eq_ignore_ascii_case("all") {
            SourceSelector::All
        } else {
            SourceSelector::Named(t.to_string())
        }
    }
}

impl From<SourceId> for SourceSelector {
    fn from(id: SourceId) -> Self {
        SourceSelector::Named(id.as_str().to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestRequest {
    pub selector: SourceSelector,
    /// Per-source item limit, at least 1.
    pub limit: u32,
}

impl IngestRequest {
    pub fn new(selector: SourceSelector, limit: u32) -> Self {
        Self {
            selector,
            limit: limit.max(1),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct IngestReport {
    /// Sources that were attempted.
    pub sources: Vec<SourceId>,
    pub count: usize,
    pub opportunities: Vec<StoredOpportunity>,
    pub outcomes: Vec<RunOutcome>,
}

struct SourceRun {
    source: SourceId,
    result: Result<Vec<CandidateRecord>, SourceFailure>,
}

/// Runs adapters, scores what they return, and hands the batch to storage.
pub struct Ingestor {
    adapters: Vec<Arc<dyn SourceAdapter>>,
    store: Arc<dyn OpportunityStore>,
}

impl Ingestor {
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>, store: Arc<dyn OpportunityStore>) -> Self {
        Self { adapters, store }
    }

    /// Sources that `"all"` expands to.
    pub fn registry(&self) -> Vec<SourceId> {
        self.adapters.iter().map(|a| a.source()).collect()
    }

    pub fn store(&self) -> &Arc<dyn OpportunityStore> {
        &self.store
    }

    /// Expand the selector. Unknown or adapter-less names are skipped with a warning.
    pub fn resolve(&self, selector: &SourceSelector) -> Vec<Arc<dyn SourceAdapter>> {
        match selector {
            SourceSelector::All => self.adapters.clone(),
            SourceSelector::Named(name) => match name.parse::<SourceId>() {
                Ok(id) => {
                    let found: Vec<_> = self
                        .adapters
                        .iter()
                        .filter(|a| a.source() == id)
                        .cloned()
                        .collect();
                    if found.is_empty() {
                        tracing::warn!(target: "ingest", source = %id, "no adapter registered for source, skipping");
                    }
                    found
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", error = %e, "skipping unknown source");
                    Vec::new()
                }
            },
        }
    }

    /// One ingestion pass.
    ///
    /// Adapters run concurrently, each bounded by its own timeout. A failing
    /// adapter becomes a failed run outcome and never stops the others. The
    /// surviving records are scored and upserted as one batch; a storage error
    /// fails the pass.
    pub async fn run(&self, req: &IngestRequest) -> Result<IngestReport, IngestError> {
        ensure_metrics_described();

        let adapters = self.resolve(&req.selector);
        let sources: Vec<SourceId> = adapters.iter().map(|a| a.source()).collect();
        tracing::info!(target: "ingest", sources = ?sources, limit = req.limit, "starting ingest");

        let runs = join_all(
            adapters
                .iter()
                .map(|a| self.run_source(Arc::clone(a), req.limit)),
        )
        .await;

        // Aggregate
        let mut outcomes = Vec::new();
        let mut pulled: BTreeMap<SourceId, usize> = BTreeMap::new();
        let mut candidates = Vec::new();
        for run in runs {
            match run.result {
                Ok(records) => {
                    *pulled.entry(run.source).or_default() += records.len();
                    candidates.extend(records);
                }
                Err(failure) => {
                    outcomes.push(RunOutcome::failed(run.source, failure.to_string()));
                }
            }
        }

        let (candidates, dup) = dedup_by_source_url(candidates);
        if dup > 0 {
            counter!("ingest_batch_dedup_total").increment(dup as u64);
            tracing::debug!(target: "ingest", dropped = dup, "collapsed repeated source urls");
        }

        if candidates.is_empty() {
            tracing::warn!(target: "ingest", sources = ?sources, "no opportunities found from specified sources");
            return Err(IngestError::EmptyResult);
        }

        // Score
        let scored: Vec<ScoredRecord> = candidates
            .into_iter()
            .map(ScoredRecord::from_candidate)
            .collect();

        // Persist
        let stored = match self.store.upsert(scored).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, "storage rejected ingest batch");
                return Err(IngestError::Persistence(e));
            }
        };
        counter!("ingest_stored_total").increment(stored.len() as u64);

        // Audit
        let mut stored_by_source: BTreeMap<SourceId, usize> = BTreeMap::new();
        for row in &stored {
            *stored_by_source.entry(row.record.source).or_default() += 1;
        }
        for src in &sources {
            let n = stored_by_source.get(src).copied().unwrap_or(0);
            if n == 0 {
                continue;
            }
            let outcome = RunOutcome::success(*src, pulled.get(src).copied().unwrap_or(n), n);
            self.audit(outcome.clone()).await;
            outcomes.push(outcome);
        }

        let now = chrono::Utc::now().timestamp().max(0);
        gauge!("ingest_pipeline_last_run_ts").set(now as f64);
        tracing::info!(target: "ingest", count = stored.len(), "ingest complete");

        Ok(IngestReport {
            sources,
            count: stored.len(),
            opportunities: stored,
            outcomes,
        })
    }

    async fn run_source(&self, adapter: Arc<dyn SourceAdapter>, limit: u32) -> SourceRun {
        let source = adapter.source();
        let bound = adapter.timeout();
        let t0 = Instant::now();

        let result = match tokio::time::timeout(bound, adapter.fetch(limit)).await {
            Ok(res) => res,
            Err(_) => Err(SourceFailure::new(
                source,
                FetchError::Timeout(format!("no response within {}ms", bound.as_millis())),
            )),
        };

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_source_fetch_ms", "source" => source.as_str()).record(ms);

        match &result {
            Ok(records) => {
                counter!("ingest_candidates_total", "source" => source.as_str())
                    .increment(records.len() as u64);
                tracing::info!(target: "ingest", source = %source, count = records.len(), "source fetched");
            }
            Err(failure) => {
                counter!("ingest_source_failures_total", "source" => source.as_str()).increment(1);
                tracing::warn!(target: "ingest", source = %source, error = %failure, "source failed");
                self.audit(RunOutcome::failed(source, failure.to_string()))
                    .await;
            }
        }

        SourceRun { source, result }
    }

    /// Best-effort audit write; failures are logged and counted only.
    async fn audit(&self, outcome: RunOutcome) {
        let source = outcome.source;
        if let Err(e) = self.store.append_run(outcome).await {
            counter!("ingest_audit_write_errors_total").increment(1);
            tracing::warn!(target: "ingest", source = %source, error = %e, "failed to write run outcome");
        }
    }
}

/// Keep the first record per `source_url`. Returns (kept, dropped).
pub fn dedup_by_source_url(records: Vec<CandidateRecord>) -> (Vec<CandidateRecord>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(records.len());
    let mut dropped = 0usize;
    for rec in records {
        if !seen.insert(rec.source_url.clone()) {
            dropped += 1;
            continue;
        }
        keep.push(rec);
    }
    (keep, dropped)
}
