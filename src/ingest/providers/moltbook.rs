// src/ingest/providers/moltbook.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FetchError, SourceFailure};
use crate::ingest::http::{fetch_within, HttpFetch, HttpRequest};
use crate::ingest::normalize::{fallback_record, FallbackContent, FallbackReason, NativeId, NativeItem};
use crate::ingest::types::{
    CandidateRecord, SignalDimensions, SourceAdapter, SourceId, TIMEOUT_MARGIN,
};

pub const AGENTS_URL: &str = "https://api.moltbook.com/v1/agents";

/// AI agents: high potential, fast to build, our wheelhouse.
pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(75.0, 7.0, 90.0, 50.0, 40.0, 80.0, 70.0, 80.0);
pub const USAGE_NORMALIZER: f64 = 100.0;
pub const DEFAULT_MOMENTUM: f64 = 50.0;

pub const FALLBACK: FallbackContent = FallbackContent {
    title: "Trending Moltbook Agents",
    description: "AI agents gaining usage on Moltbook",
    url: "https://moltbook.com",
    signals: PROFILE,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoltbookAgent {
    pub id: NativeId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub usage_count: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct AgentsResponse {
    agents: Vec<MoltbookAgent>,
}

/// Trending agents from Moltbook. Requires an API key; without one the
/// adapter returns its placeholder instead of failing.
pub struct MoltbookAdapter {
    http: Arc<dyn HttpFetch>,
    api_key: Option<String>,
    timeout: Duration,
}

impl MoltbookAdapter {
    pub fn new(http: Arc<dyn HttpFetch>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            timeout,
        }
    }

    fn request(&self, api_key: &str, limit: u32) -> HttpRequest {
        HttpRequest::get(AGENTS_URL)
            .bearer(api_key)
            .header("Content-Type", "application/json")
            .query("limit", limit)
            .query("trending", true)
            .timeout(self.timeout)
    }

    pub fn parse_items(body: Value) -> Result<Vec<NativeItem>, FetchError> {
        let resp: AgentsResponse = serde_json::from_value(body)?;
        Ok(resp.agents.into_iter().map(NativeItem::Moltbook).collect())
    }
}

#[async_trait]
impl SourceAdapter for MoltbookAdapter {
    fn source(&self) -> SourceId {
        SourceId::Moltbook
    }

    fn timeout(&self) -> Duration {
        self.timeout + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(target: "ingest", source = "moltbook", "MOLTBOOK_API_KEY not configured, using fallback data");
            return Ok(vec![fallback_record(
                SourceId::Moltbook,
                &FALLBACK,
                FallbackReason::NotConfigured,
            )]);
        };

        let fail = |e| SourceFailure::new(SourceId::Moltbook, e);
        let body = fetch_within(self.http.as_ref(), self.request(api_key, limit))
            .await
            .map_err(fail)?;
        let items = Self::parse_items(body).map_err(fail)?;
        Ok(items
            .into_iter()
            .filter_map(NativeItem::into_candidate)
            .take(limit as usize)
            .collect())
    }
}
