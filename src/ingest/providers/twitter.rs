// src/ingest/providers/twitter.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FetchError, SourceFailure};
use crate::ingest::http::{fetch_within, HttpFetch, HttpRequest};
use crate::ingest::normalize::{fallback_record, FallbackContent, FallbackReason, NativeItem};
use crate::ingest::types::{
    CandidateRecord, SignalDimensions, SourceAdapter, SourceId, TIMEOUT_MARGIN,
};

pub const SEARCH_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
pub const SEARCH_QUERY: &str = "AI SaaS startup -is:retweet";

pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(70.0, 5.0, 85.0, 40.0, 45.0, 75.0, 80.0, 80.0);
/// likes + retweets + replies, 10k engagements saturate.
pub const ENGAGEMENT_NORMALIZER: f64 = 10_000.0;
pub const TITLE_CHARS: usize = 100;

pub const FALLBACK: FallbackContent = FallbackContent {
    title: "AI/SaaS Innovation Thread",
    description: "Emerging discussion about AI tooling and SaaS opportunities",
    url: "https://twitter.com/search?q=AI%20SaaS",
    signals: SignalDimensions::profile(70.0, 7.0, 85.0, 75.0, 45.0, 75.0, 80.0, 80.0),
};

/// Recent search accepts 10..=100 results per page.
const MIN_RESULTS: u32 = 10;
const MAX_RESULTS: u32 = 100;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TweetMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub public_metrics: TweetMetrics,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMetrics {
    #[serde(default)]
    pub followers_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TwitterUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub public_metrics: Option<UserMetrics>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Option<Includes>,
}

#[derive(Debug, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<TwitterUser>,
}

/// Recent tweets about AI/SaaS. Needs a bearer token; without one, or when the
/// request fails, the adapter degrades to its placeholder.
pub struct TwitterAdapter {
    http: Arc<dyn HttpFetch>,
    bearer_token: Option<String>,
    timeout: Duration,
}

impl TwitterAdapter {
    pub fn new(http: Arc<dyn HttpFetch>, bearer_token: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            bearer_token,
            timeout,
        }
    }

    fn request(&self, token: &str, limit: u32) -> HttpRequest {
        HttpRequest::get(SEARCH_URL)
            .bearer(token)
            .query("query", SEARCH_QUERY)
            .query("max_results", limit.clamp(MIN_RESULTS, MAX_RESULTS))
            .query("tweet.fields", "public_metrics,created_at")
            .query("expansions", "author_id")
            .query("user.fields", "username,public_metrics")
            .timeout(self.timeout)
    }

    /// Join each tweet with its expanded author.
    pub fn parse_items(body: Value) -> Result<Vec<NativeItem>, FetchError> {
        let resp: SearchResponse = serde_json::from_value(body)?;
        let users = resp.includes.map(|i| i.users).unwrap_or_default();
        Ok(resp
            .data
            .into_iter()
            .map(|tweet| {
                let author = tweet
                    .author_id
                    .as_deref()
                    .and_then(|aid| users.iter().find(|u| u.id == aid))
                    .cloned();
                NativeItem::Twitter { tweet, author }
            })
            .collect())
    }

    async fn fetch_live(&self, token: &str, limit: u32) -> Result<Vec<CandidateRecord>, FetchError> {
        let body = fetch_within(self.http.as_ref(), self.request(token, limit)).await?;
        let items = Self::parse_items(body)?;
        Ok(items
            .into_iter()
            .filter_map(NativeItem::into_candidate)
            .take(limit as usize)
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for TwitterAdapter {
    fn source(&self) -> SourceId {
        SourceId::Twitter
    }

    fn timeout(&self) -> Duration {
        self.timeout + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let Some(token) = self.bearer_token.as_deref() else {
            tracing::warn!(target: "ingest", source = "twitter", "TWITTER_BEARER_TOKEN not configured, using fallback data");
            return Ok(vec![fallback_record(
                SourceId::Twitter,
                &FALLBACK,
                FallbackReason::NotConfigured,
            )]);
        };

        match self.fetch_live(token, limit).await {
            Ok(records) => Ok(records),
            Err(e) => {
                tracing::warn!(target: "ingest", source = "twitter", error = %e, "twitter request failed, using fallback data");
                Ok(vec![fallback_record(
                    SourceId::Twitter,
                    &FALLBACK,
                    FallbackReason::RequestFailed,
                )])
            }
        }
    }
}
