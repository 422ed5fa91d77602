// src/ingest/providers/producthunt.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FetchError, SourceFailure};
use crate::ingest::http::{fetch_within, HttpFetch, HttpRequest};
use crate::ingest::normalize::{fallback_record, FallbackContent, FallbackReason, NativeItem};
use crate::ingest::types::{
    CandidateRecord, SignalDimensions, SourceAdapter, SourceId, TIMEOUT_MARGIN,
};

pub const GRAPHQL_URL: &str = "https://api.producthunt.com/v2/api/graphql";

pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(75.0, 10.0, 80.0, 40.0, 50.0, 75.0, 85.0, 80.0);
pub const VOTE_NORMALIZER: f64 = 500.0;

pub const FALLBACK: FallbackContent = FallbackContent {
    title: "Trending Product Hunt Products",
    description: "Emerging products gaining traction on Product Hunt",
    url: "https://www.producthunt.com",
    signals: SignalDimensions::profile(75.0, 10.0, 80.0, 80.0, 50.0, 75.0, 85.0, 80.0),
};

const MAX_FIRST: u32 = 50;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Maker {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductHuntPost {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub votes_count: u64,
    pub url: String,
    #[serde(default)]
    pub makers: Vec<Maker>,
    #[serde(default)]
    pub comments_count: Option<u64>,
    #[serde(default)]
    pub reviews_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PostsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PostsData {
    posts: Connection,
}

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: ProductHuntPost,
}

pub fn posts_query(first: u32) -> String {
    format!(
        "{{ posts(first: {first}, order: RANKING) {{ edges {{ node {{ \
         id name tagline description votesCount url commentsCount reviewsCount \
         makers {{ name username }} }} }} }} }}"
    )
}

/// Top-ranked Product Hunt launches over the GraphQL API. Needs an API token;
/// missing token or request failure degrade to the placeholder.
pub struct ProductHuntAdapter {
    http: Arc<dyn HttpFetch>,
    api_key: Option<String>,
    timeout: Duration,
}

impl ProductHuntAdapter {
    pub fn new(http: Arc<dyn HttpFetch>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            api_key,
            timeout,
        }
    }

    fn request(&self, api_key: &str, limit: u32) -> HttpRequest {
        let body = json!({ "query": posts_query(limit.clamp(1, MAX_FIRST)) });
        HttpRequest::post(GRAPHQL_URL, body)
            .bearer(api_key)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .timeout(self.timeout)
    }

    pub fn parse_items(body: Value) -> Result<Vec<NativeItem>, FetchError> {
        let resp: GraphQlResponse = serde_json::from_value(body)?;
        match resp.data {
            Some(data) => Ok(data
                .posts
                .edges
                .into_iter()
                .map(|e| NativeItem::ProductHunt(e.node))
                .collect()),
            None => {
                let msg = resp
                    .errors
                    .into_iter()
                    .map(|e| e.message)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(FetchError::Decode(format!("graphql response without data: {msg}")))
            }
        }
    }

    async fn fetch_live(&self, api_key: &str, limit: u32) -> Result<Vec<CandidateRecord>, FetchError> {
        let body = fetch_within(self.http.as_ref(), self.request(api_key, limit)).await?;
        let items = Self::parse_items(body)?;
        Ok(items
            .into_iter()
            .filter_map(NativeItem::into_candidate)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for ProductHuntAdapter {
    fn source(&self) -> SourceId {
        SourceId::ProductHunt
    }

    fn timeout(&self) -> Duration {
        self.timeout + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::warn!(target: "ingest", source = "producthunt", "PRODUCTHUNT_API_KEY not configured, using fallback data");
            return Ok(vec![fallback_record(
                SourceId::ProductHunt,
                &FALLBACK,
                FallbackReason::NotConfigured,
            )]);
        };

        match self.fetch_live(api_key, limit).await {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(target: "ingest", source = "producthunt", error = %e, "product hunt request failed, using fallback data");
                Ok(vec![fallback_record(
                    SourceId::ProductHunt,
                    &FALLBACK,
                    FallbackReason::RequestFailed,
                )])
            }
        }
    }
}
