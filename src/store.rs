//! Persistence contract for scored opportunities and the run audit log.
//!
//! The real storage engine lives outside this crate. `InMemoryStore` is the
//! reference implementation used by the server binary and the tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{StoreError, UnknownStatus};
use crate::ingest::types::{CandidateRecord, SourceId};
use crate::scoring::{self, Dimensions, ScoreBreakdown};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    #[default]
    New,
    Pursuing,
    Watching,
    Passed,
}

impl FromStr for OpportunityStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "pursuing" => Ok(Self::Pursuing),
            "watching" => Ok(Self::Watching),
            "passed" => Ok(Self::Passed),
            _ => Err(UnknownStatus(s.trim().to_string())),
        }
    }
}

/// Candidate record plus its score. Dimensions are stored resolved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub title: String,
    pub description: Option<String>,
    pub source: SourceId,
    pub source_url: String,
    pub source_id: String,
    pub raw_data: serde_json::Value,
    #[serde(flatten)]
    pub dimensions: Dimensions,
    pub final_score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub time_to_market_bonus: f64,
    pub status: OpportunityStatus,
    #[serde(default)]
    pub fallback: bool,
}

impl ScoredRecord {
    pub fn from_candidate(c: CandidateRecord) -> Self {
        let dimensions = c.signals.resolve();
        let result = scoring::score(&dimensions);
        Self {
            title: c.title,
            description: c.description,
            source: c.source,
            source_url: c.source_url,
            source_id: c.source_id,
            raw_data: c.raw_data,
            dimensions,
            final_score: result.final_score,
            score_breakdown: result.breakdown,
            time_to_market_bonus: result.time_to_market_bonus,
            status: OpportunityStatus::default(),
            fallback: c.fallback,
        }
    }
}

/// A scored record as persisted, with identity and user-owned fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredOpportunity {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: ScoredRecord,
    pub manual_override: bool,
    pub override_score: Option<f64>,
    pub override_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ingested_at: DateTime<Utc>,
}

impl StoredOpportunity {
    /// The override if one is set, otherwise the computed score.
    pub fn effective_score(&self) -> f64 {
        match (self.manual_override, self.override_score) {
            (true, Some(s)) => s,
            _ => self.record.final_score,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

/// One audit row per (source, ingestion attempt).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub source: SourceId,
    pub status: RunStatus,
    pub records_pulled: usize,
    pub records_stored: usize,
    pub error_message: Option<String>,
    pub run_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn success(source: SourceId, pulled: usize, stored: usize) -> Self {
        Self {
            source,
            status: RunStatus::Success,
            records_pulled: pulled,
            records_stored: stored,
            error_message: None,
            run_at: Utc::now(),
        }
    }

    pub fn failed(source: SourceId, message: impl Into<String>) -> Self {
        Self {
            source,
            status: RunStatus::Failed,
            records_pulled: 0,
            records_stored: 0,
            error_message: Some(message.into()),
            run_at: Utc::now(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Score,
    Date,
    Source,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OpportunityQuery {
    pub status: Option<OpportunityStatus>,
    pub source: Option<SourceId>,
    pub min_score: f64,
    pub max_score: f64,
    pub sort_by: SortBy,
    pub limit: usize,
    pub offset: usize,
}

impl Default for OpportunityQuery {
    fn default() -> Self {
        Self {
            status: None,
            source: None,
            min_score: 0.0,
            max_score: 100.0,
            sort_by: SortBy::Score,
            limit: 100,
            offset: 0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunityUpdate {
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
    #[serde(default)]
    pub override_score: Option<f64>,
    #[serde(default)]
    pub override_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub items: Vec<StoredOpportunity>,
    /// Matches before pagination.
    pub total: usize,
}

#[async_trait]
pub trait OpportunityStore: Send + Sync {
    /// Insert or update by `source_url`. All-or-nothing for the batch.
    async fn upsert(&self, records: Vec<ScoredRecord>) -> Result<Vec<StoredOpportunity>, StoreError>;

    /// Append one audit row.
    async fn append_run(&self, outcome: RunOutcome) -> Result<(), StoreError>;

    async fn list(&self, query: &OpportunityQuery) -> Result<Page, StoreError>;

    async fn update(&self, id: Uuid, update: OpportunityUpdate) -> Result<StoredOpportunity, StoreError>;
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<Uuid, StoredOpportunity>,
    by_url: HashMap<String, Uuid>,
    runs: Vec<RunOutcome>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store mutex poisoned".into()))
    }

    /// Audit rows in append order.
    pub fn runs(&self) -> Vec<RunOutcome> {
        self.lock().map(|g| g.runs.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|g| g.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_by_url(&self, source_url: &str) -> Option<StoredOpportunity> {
        let g = self.lock().ok()?;
        g.by_url.get(source_url).and_then(|id| g.rows.get(id)).cloned()
    }
}

#[async_trait]
impl OpportunityStore for InMemoryStore {
    async fn upsert(&self, records: Vec<ScoredRecord>) -> Result<Vec<StoredOpportunity>, StoreError> {
        // Validate the whole batch before touching anything.
        if let Some(bad) = records.iter().find(|r| r.source_url.trim().is_empty()) {
            return Err(StoreError::Conflict {
                key: "source_url".into(),
                message: format!("empty dedup key for '{}'", bad.title),
            });
        }

        let now = Utc::now();
        let mut g = self.lock()?;
        let inner = &mut *g;
        let mut out = Vec::with_capacity(records.len());

        for mut rec in records {
            let row = match inner.by_url.get(&rec.source_url).copied() {
                Some(id) => {
                    let Some(existing) = inner.rows.get_mut(&id) else {
                        return Err(StoreError::Backend(format!("dangling index for {id}")));
                    };
                    // user-owned state survives re-ingestion
                    rec.status = existing.record.status;
                    existing.record = rec;
                    existing.updated_at = now;
                    existing.ingested_at = now;
                    existing.clone()
                }
                None => {
                    let id = Uuid::new_v4();
                    let row = StoredOpportunity {
                        id,
                        record: rec,
                        manual_override: false,
                        override_score: None,
                        override_reason: None,
                        created_at: now,
                        updated_at: now,
                        ingested_at: now,
                    };
                    inner.by_url.insert(row.record.source_url.clone(), id);
                    inner.rows.insert(id, row.clone());
                    row
                }
            };
            out.push(row);
        }
        Ok(out)
    }

    async fn append_run(&self, outcome: RunOutcome) -> Result<(), StoreError> {
        self.lock()?.runs.push(outcome);
        Ok(())
    }

    async fn list(&self, q: &OpportunityQuery) -> Result<Page, StoreError> {
        let g = self.lock()?;
        let mut items: Vec<StoredOpportunity> = g
            .rows
            .values()
            .filter(|o| o.record.final_score >= q.min_score && o.record.final_score <= q.max_score)
            .filter(|o| q.status.map_or(true, |s| o.record.status == s))
            .filter(|o| q.source.map_or(true, |s| o.record.source == s))
            .cloned()
            .collect();
        drop(g);

        match q.sort_by {
            SortBy::Score => items.sort_by(|a, b| {
                b.record
                    .final_score
                    .total_cmp(&a.record.final_score)
                    .then_with(|| a.record.source_url.cmp(&b.record.source_url))
            }),
            SortBy::Date => items.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.record.source_url.cmp(&b.record.source_url))
            }),
            SortBy::Source => items.sort_by(|a, b| {
                a.record
                    .source
                    .as_str()
                    .cmp(b.record.source.as_str())
                    .then_with(|| b.record.final_score.total_cmp(&a.record.final_score))
            }),
        }

        let total = items.len();
        let items = items.into_iter().skip(q.offset).take(q.limit).collect();
        Ok(Page { items, total })
    }

    async fn update(&self, id: Uuid, update: OpportunityUpdate) -> Result<StoredOpportunity, StoreError> {
        let mut g = self.lock()?;
        let row = g
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if let Some(status) = update.status {
            row.record.status = status;
        }
        if let Some(score) = update.override_score {
            row.manual_override = true;
            row.override_score = Some(scoring::round2(score.clamp(0.0, 100.0)));
        }
        if let Some(reason) = update.override_reason {
            row.override_reason = Some(reason);
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::SignalDimensions;
    use serde_json::json;

    fn candidate(url: &str, momentum: f64) -> CandidateRecord {
        CandidateRecord {
            title: format!("item {url}"),
            description: None,
            source: SourceId::GitHub,
            source_url: url.to_string(),
            source_id: url.to_string(),
            raw_data: json!({}),
            signals: SignalDimensions::default().with_momentum(momentum),
            fallback: false,
        }
    }

    #[test]
    fn scored_record_starts_as_new_with_resolved_dims() {
        let r = ScoredRecord::from_candidate(candidate("https://x.test/1", 80.0));
        assert_eq!(r.status, OpportunityStatus::New);
        assert_eq!(r.dimensions.momentum, 80.0);
        assert_eq!(r.dimensions.timeline_days, 14.0);
        assert!(r.final_score > 0.0 && r.final_score <= 100.0);
    }

    #[test]
    fn status_parses_case_insensitively_with_typed_error() {
        assert_eq!(" Watching ".parse::<OpportunityStatus>(), Ok(OpportunityStatus::Watching));
        let err = "archived".parse::<OpportunityStatus>().unwrap_err();
        assert_eq!(err, UnknownStatus("archived".into()));
        assert_eq!(err.to_string(), "unknown status 'archived'");
    }

    #[test]
    fn serialized_record_is_flat() {
        let r = ScoredRecord::from_candidate(candidate("https://x.test/1", 80.0));
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["momentum"], json!(80.0));
        assert_eq!(v["status"], json!("new"));
        assert_eq!(v["source"], json!("github"));
        assert!(v["score_breakdown"]["base_score"].is_number());
    }

    #[tokio::test]
    async fn upsert_keeps_identity_and_status() {
        let store = InMemoryStore::new();
        let first = store
            .upsert(vec![ScoredRecord::from_candidate(candidate("https://x.test/1", 10.0))])
            .await
            .unwrap();
        let id = first[0].id;

        store
            .update(
                id,
                OpportunityUpdate {
                    status: Some(OpportunityStatus::Pursuing),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let second = store
            .upsert(vec![ScoredRecord::from_candidate(candidate("https://x.test/1", 90.0))])
            .await
            .unwrap();
        assert_eq!(second[0].id, id);
        assert_eq!(second[0].record.status, OpportunityStatus::Pursuing);
        assert_eq!(second[0].record.dimensions.momentum, 90.0);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn batch_with_empty_key_is_rejected_whole() {
        let store = InMemoryStore::new();
        let err = store
            .upsert(vec![
                ScoredRecord::from_candidate(candidate("https://x.test/ok", 10.0)),
                ScoredRecord::from_candidate(candidate("  ", 10.0)),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn list_filters_sorts_and_pages() {
        let store = InMemoryStore::new();
        let recs = (0..5)
            .map(|i| ScoredRecord::from_candidate(candidate(&format!("https://x.test/{i}"), i as f64 * 20.0)))
            .collect();
        store.upsert(recs).await.unwrap();

        let page = store
            .list(&OpportunityQuery {
                limit: 2,
                offset: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].record.final_score >= page.items[1].record.final_score);
        assert_eq!(page.items[0].record.source_url, "https://x.test/3");

        let none = store
            .list(&OpportunityQuery {
                status: Some(OpportunityStatus::Passed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(none.total, 0);
    }

    #[tokio::test]
    async fn override_sets_flag_and_effective_score() {
        let store = InMemoryStore::new();
        let rows = store
            .upsert(vec![ScoredRecord::from_candidate(candidate("https://x.test/1", 10.0))])
            .await
            .unwrap();
        let updated = store
            .update(
                rows[0].id,
                OpportunityUpdate {
                    override_score: Some(99.556),
                    override_reason: Some("warm intro".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(updated.manual_override);
        assert_eq!(updated.effective_score(), 99.56);

        let missing = store.update(Uuid::new_v4(), OpportunityUpdate::default()).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }
}
