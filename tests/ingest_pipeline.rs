// tests/ingest_pipeline.rs
//
// Orchestrator behaviour with stub adapters and an instrumented store:
// failure isolation, empty results, persistence errors, best-effort audit,
// and upsert-by-source_url.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arbitrage_engine::error::{FetchError, IngestError, SourceFailure, StoreError};
use arbitrage_engine::ingest::http::{HttpFetch, HttpRequest};
use arbitrage_engine::ingest::providers::reddit::RedditAdapter;
use arbitrage_engine::ingest::providers::twitter::TwitterAdapter;
use arbitrage_engine::ingest::types::{CandidateRecord, SignalDimensions, SourceAdapter, SourceId};
use arbitrage_engine::ingest::{IngestRequest, Ingestor, SourceSelector};
use arbitrage_engine::store::{
    InMemoryStore, OpportunityQuery, OpportunityStore, OpportunityUpdate, Page, RunOutcome,
    RunStatus, ScoredRecord, StoredOpportunity,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

fn candidate(source: SourceId, url: &str, momentum: f64) -> CandidateRecord {
    CandidateRecord {
        title: format!("{source} item"),
        description: Some("desc".into()),
        source,
        source_url: url.to_string(),
        source_id: url.rsplit('/').next().unwrap_or(url).to_string(),
        raw_data: json!({ "url": url }),
        signals: SignalDimensions::default().with_momentum(momentum),
        fallback: false,
    }
}

enum Behaviour {
    Records(Vec<CandidateRecord>),
    Fail(&'static str),
    Hang,
}

struct StubAdapter {
    source: SourceId,
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl StubAdapter {
    fn new(source: SourceId, behaviour: Behaviour) -> Arc<Self> {
        Arc::new(Self {
            source,
            behaviour,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl SourceAdapter for StubAdapter {
    fn source(&self) -> SourceId {
        self.source
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(50)
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behaviour {
            Behaviour::Records(r) => Ok(r.iter().take(limit as usize).cloned().collect()),
            Behaviour::Fail(msg) => Err(SourceFailure::new(
                self.source,
                FetchError::Network(msg.to_string()),
            )),
            Behaviour::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(Vec::new())
            }
        }
    }
}

/// InMemoryStore plus call counters and switchable failures.
#[derive(Default)]
struct TestStore {
    inner: InMemoryStore,
    upserts: AtomicUsize,
    fail_upsert: bool,
    fail_audit: bool,
}

#[async_trait]
impl OpportunityStore for TestStore {
    async fn upsert(&self, records: Vec<ScoredRecord>) -> Result<Vec<StoredOpportunity>, StoreError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_upsert {
            return Err(StoreError::Backend("duplicate key value violates constraint".into()));
        }
        self.inner.upsert(records).await
    }

    async fn append_run(&self, outcome: RunOutcome) -> Result<(), StoreError> {
        if self.fail_audit {
            return Err(StoreError::Backend("audit table missing".into()));
        }
        self.inner.append_run(outcome).await
    }

    async fn list(&self, query: &OpportunityQuery) -> Result<Page, StoreError> {
        self.inner.list(query).await
    }

    async fn update(&self, id: Uuid, update: OpportunityUpdate) -> Result<StoredOpportunity, StoreError> {
        self.inner.update(id, update).await
    }
}

fn ingestor(adapters: Vec<Arc<StubAdapter>>, store: Arc<TestStore>) -> Ingestor {
    let adapters = adapters
        .into_iter()
        .map(|a| a as Arc<dyn SourceAdapter>)
        .collect();
    Ingestor::new(adapters, store)
}

fn all(limit: u32) -> IngestRequest {
    IngestRequest::new(SourceSelector::All, limit)
}

#[tokio::test]
async fn failing_source_is_isolated_from_succeeding_one() {
    let store = Arc::new(TestStore::default());
    let good = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![
            candidate(SourceId::GitHub, "https://github.com/a/one", 10.0),
            candidate(SourceId::GitHub, "https://github.com/a/two", 90.0),
        ]),
    );
    let bad = StubAdapter::new(SourceId::Moltbook, Behaviour::Fail("connection reset"));
    let ing = ingestor(vec![good, bad], store.clone());

    let report = ing.run(&all(10)).await.unwrap();
    assert_eq!(report.sources, vec![SourceId::GitHub, SourceId::Moltbook]);
    assert_eq!(report.count, 2);
    assert!(report
        .opportunities
        .iter()
        .all(|o| o.record.source == SourceId::GitHub));

    let runs = store.inner.runs();
    assert_eq!(runs.len(), 2);
    let failed = runs.iter().find(|r| r.source == SourceId::Moltbook).unwrap();
    assert_eq!(failed.status, RunStatus::Failed);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("connection reset"));
    let ok = runs.iter().find(|r| r.source == SourceId::GitHub).unwrap();
    assert_eq!(ok.status, RunStatus::Success);
    assert_eq!(ok.records_stored, 2);
    assert_eq!(ok.records_pulled, 2);

    assert_eq!(report.outcomes.len(), 2);
}

#[tokio::test]
async fn empty_aggregate_fails_without_persisting() {
    let store = Arc::new(TestStore::default());
    let a = StubAdapter::new(SourceId::GitHub, Behaviour::Records(Vec::new()));
    let b = StubAdapter::new(SourceId::Reddit, Behaviour::Fail("boom"));
    let ing = ingestor(vec![a, b], store.clone());

    let err = ing.run(&all(10)).await.unwrap_err();
    assert_eq!(err, IngestError::EmptyResult);
    assert_eq!(err.to_string(), "No opportunities found from specified sources");
    assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    assert!(store.inner.is_empty());

    // the failed source is still audited
    let runs = store.inner.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].source, SourceId::Reddit);
}

#[tokio::test]
async fn persistence_failure_fails_the_pass_with_storage_message() {
    let store = Arc::new(TestStore {
        fail_upsert: true,
        ..Default::default()
    });
    let a = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let ing = ingestor(vec![a], store.clone());

    let err = ing.run(&all(10)).await.unwrap_err();
    assert!(matches!(err, IngestError::Persistence(StoreError::Backend(_))));
    assert!(err.to_string().contains("duplicate key value"));
    assert!(store.inner.runs().is_empty());
}

#[tokio::test]
async fn audit_write_failures_are_swallowed() {
    let store = Arc::new(TestStore {
        fail_audit: true,
        ..Default::default()
    });
    let a = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let b = StubAdapter::new(SourceId::Twitter, Behaviour::Fail("401"));
    let ing = ingestor(vec![a, b], store.clone());

    let report = ing.run(&all(10)).await.unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(store.inner.len(), 1);
}

#[tokio::test]
async fn reingesting_same_url_updates_in_place() {
    let store = Arc::new(TestStore::default());
    let first = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let report = ingestor(vec![first], store.clone()).run(&all(10)).await.unwrap();
    let id = report.opportunities[0].id;
    let first_score = report.opportunities[0].record.final_score;

    let second = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 100.0)]),
    );
    let report = ingestor(vec![second], store.clone()).run(&all(10)).await.unwrap();

    assert_eq!(store.inner.len(), 1);
    assert_eq!(report.opportunities[0].id, id);
    assert!(report.opportunities[0].record.final_score > first_score);
    assert_eq!(
        store
            .inner
            .get_by_url("https://github.com/a/one")
            .map(|o| o.record.dimensions.momentum),
        Some(100.0)
    );
}

#[tokio::test]
async fn repeated_urls_within_one_pass_collapse_to_first() {
    let store = Arc::new(TestStore::default());
    let a = StubAdapter::new(
        SourceId::Reddit,
        Behaviour::Records(vec![
            candidate(SourceId::Reddit, "https://reddit.com/r/x/1", 10.0),
            candidate(SourceId::Reddit, "https://reddit.com/r/x/1", 60.0),
        ]),
    );
    let ing = ingestor(vec![a], store.clone());

    let report = ing.run(&all(10)).await.unwrap();
    assert_eq!(report.count, 1);
    assert_eq!(report.opportunities[0].record.dimensions.momentum, 10.0);

    let ok = &store.inner.runs()[0];
    assert_eq!(ok.records_pulled, 2);
    assert_eq!(ok.records_stored, 1);
}

#[tokio::test]
async fn named_selector_runs_only_that_source() {
    let store = Arc::new(TestStore::default());
    let gh = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let rd = StubAdapter::new(
        SourceId::Reddit,
        Behaviour::Records(vec![candidate(SourceId::Reddit, "https://reddit.com/r/x/1", 10.0)]),
    );
    let ing = ingestor(vec![gh.clone(), rd.clone()], store.clone());

    let report = ing
        .run(&IngestRequest::new(SourceSelector::parse("Reddit"), 5))
        .await
        .unwrap();
    assert_eq!(report.sources, vec![SourceId::Reddit]);
    assert_eq!(gh.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rd.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unknown_and_adapterless_sources_are_skipped() {
    let store = Arc::new(TestStore::default());
    let gh = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let ing = ingestor(vec![gh.clone()], store.clone());

    for name in ["myspace", "hackernews"] {
        let err = ing
            .run(&IngestRequest::new(SourceSelector::parse(name), 5))
            .await
            .unwrap_err();
        assert_eq!(err, IngestError::EmptyResult);
    }
    assert_eq!(gh.calls.load(Ordering::SeqCst), 0);
    assert!(store.inner.runs().is_empty());
}

#[tokio::test]
async fn hanging_source_times_out_as_failure() {
    let store = Arc::new(TestStore::default());
    let slow = StubAdapter::new(SourceId::AppSumo, Behaviour::Hang);
    let fast = StubAdapter::new(
        SourceId::GitHub,
        Behaviour::Records(vec![candidate(SourceId::GitHub, "https://github.com/a/one", 10.0)]),
    );
    let ing = ingestor(vec![slow, fast], store.clone());

    let report = ing.run(&all(10)).await.unwrap();
    assert_eq!(report.count, 1);

    let runs = store.inner.runs();
    let timed_out = runs.iter().find(|r| r.source == SourceId::AppSumo).unwrap();
    assert_eq!(timed_out.status, RunStatus::Failed);
    assert!(timed_out
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("timed out"));
}

#[tokio::test]
async fn limit_is_passed_to_each_adapter() {
    let store = Arc::new(TestStore::default());
    let recs = (0..5)
        .map(|i| candidate(SourceId::GitHub, &format!("https://github.com/a/{i}"), 10.0))
        .collect();
    let gh = StubAdapter::new(SourceId::GitHub, Behaviour::Records(recs));
    let ing = ingestor(vec![gh], store.clone());

    let report = ing.run(&all(3)).await.unwrap();
    assert_eq!(report.count, 3);
}

/// Fetcher that never answers and ignores the request timeout.
struct StalledFetch;

#[async_trait]
impl HttpFetch for StalledFetch {
    async fn fetch_json(&self, _req: HttpRequest) -> Result<Value, FetchError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Value::Null)
    }
}

#[tokio::test]
async fn stalled_upstreams_degrade_to_placeholders_not_failures() {
    let store = Arc::new(TestStore::default());
    let http: Arc<dyn HttpFetch> = Arc::new(StalledFetch);
    let reddit: Arc<dyn SourceAdapter> = Arc::new(RedditAdapter::new(
        http.clone(),
        vec!["SaaS".into(), "startups".into(), "Entrepreneur".into()],
        "test-agent",
        Duration::from_millis(200),
    ));
    let twitter: Arc<dyn SourceAdapter> = Arc::new(TwitterAdapter::new(
        http,
        Some("bt".into()),
        Duration::from_millis(300),
    ));
    let ing = Ingestor::new(vec![reddit, twitter], store.clone());

    let report = ing.run(&all(10)).await.unwrap();
    assert_eq!(report.count, 2);

    let mut ids: Vec<&str> = report
        .opportunities
        .iter()
        .map(|o| o.record.source_id.as_str())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["reddit_fallback", "twitter_fallback_error"]);
    assert!(report.opportunities.iter().all(|o| o.record.fallback));

    let runs = store.inner.runs();
    assert_eq!(runs.len(), 2);
    assert!(runs.iter().all(|r| r.status == RunStatus::Success));
}
