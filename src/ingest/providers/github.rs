// src/ingest/providers/github.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FetchError, SourceFailure};
use crate::ingest::http::{fetch_within, HttpFetch, HttpRequest};
use crate::ingest::normalize::NativeItem;
use crate::ingest::types::{
    CandidateRecord, SignalDimensions, SourceAdapter, SourceId, TIMEOUT_MARGIN,
};

pub const SEARCH_URL: &str = "https://api.github.com/search/repositories";

/// Popular repos: moderate revenue, buildable with code.
pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(60.0, 14.0, 80.0, 40.0, 50.0, 70.0, 60.0, 70.0);
pub const STAR_NORMALIZER: f64 = 10_000.0;

/// The search API caps `per_page` at 100.
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubRepo {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    items: Vec<GithubRepo>,
}

/// Most-starred repositories from the GitHub search API. Needs no credential;
/// a token only raises the rate limit.
pub struct GithubAdapter {
    http: Arc<dyn HttpFetch>,
    token: Option<String>,
    timeout: Duration,
}

impl GithubAdapter {
    pub fn new(http: Arc<dyn HttpFetch>, token: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            token,
            timeout,
        }
    }

    pub fn request(&self, limit: u32) -> HttpRequest {
        let mut req = HttpRequest::get(SEARCH_URL)
            .header("Accept", "application/vnd.github.v3+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query("q", "stars:>100")
            .query("sort", "stars")
            .query("order", "desc")
            .query("per_page", limit.clamp(1, MAX_PER_PAGE))
            .timeout(self.timeout);
        if let Some(token) = &self.token {
            req = req.bearer(token);
        }
        req
    }

    pub fn parse_items(body: Value) -> Result<Vec<NativeItem>, FetchError> {
        let resp: SearchResponse = serde_json::from_value(body)?;
        Ok(resp.items.into_iter().map(NativeItem::GitHub).collect())
    }
}

#[async_trait]
impl SourceAdapter for GithubAdapter {
    fn source(&self) -> SourceId {
        SourceId::GitHub
    }

    fn timeout(&self) -> Duration {
        self.timeout + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let fail = |e| SourceFailure::new(SourceId::GitHub, e);
        let body = fetch_within(self.http.as_ref(), self.request(limit))
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
