// src/ingest/providers/reddit.rs
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

pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(65.0, 10.0, 75.0, 40.0, 55.0, 70.0, 65.0, 70.0);
pub const ENGAGEMENT_NORMALIZER: f64 = 1_000.0;
pub const DESCRIPTION_CHARS: usize = 500;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

pub const FALLBACK: FallbackContent = FallbackContent {
    title: "Failed to fetch Reddit data",
    description: "Using fallback mock data",
    url: "https://reddit.com/r/entrepreneur",
    signals: SignalDimensions::profile(50.0, 14.0, 70.0, 40.0, 50.0, 60.0, 50.0, 60.0),
};

pub fn hot_url(subreddit: &str) -> String {
    format!("https://www.reddit.com/r/{subreddit}/hot.json")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub is_self: bool,
    pub permalink: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub ups: i64,
    #[serde(default)]
    pub num_comments: u64,
    #[serde(default)]
    pub created_utc: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    kind: String,
    data: Value,
}

/// Hot self-posts across several subreddits via the public JSON listings.
///
/// Each subreddit is a separate feed; a failing feed is skipped. Only when
/// every feed fails does the adapter return its placeholder.
pub struct RedditAdapter {
    http: Arc<dyn HttpFetch>,
    subreddits: Vec<String>,
    user_agent: String,
    timeout: Duration,
}

impl RedditAdapter {
    pub fn new(
        http: Arc<dyn HttpFetch>,
        subreddits: Vec<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            subreddits,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    fn per_feed(&self, limit: u32) -> u32 {
        let feeds = self.subreddits.len().max(1) as u32;
        limit.div_ceil(feeds).max(1)
    }

    fn request(&self, subreddit: &str, per_feed: u32) -> HttpRequest {
        HttpRequest::get(hot_url(subreddit))
            .header("User-Agent", self.user_agent.as_str())
            .query("limit", per_feed)
            .timeout(self.timeout)
    }

    /// Keep link posts of kind `t3` that are self-posts with a body.
    pub fn parse_items(body: Value, per_feed: usize) -> Result<Vec<NativeItem>, FetchError> {
        let listing: Listing = serde_json::from_value(body)?;
        Ok(listing
            .data
            .children
            .into_iter()
            .filter(|c| c.kind == "t3")
            .filter_map(|c| serde_json::from_value::<RedditPost>(c.data).ok())
            .filter(|p| p.is_self && !p.selftext.trim().is_empty())
            .take(per_feed)
            .map(NativeItem::Reddit)
            .collect())
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    fn source(&self) -> SourceId {
        SourceId::Reddit
    }

    /// Feeds run one after another, each with its own request timeout. The
    /// margin is counted per feed so a run of stalled feeds still ends in the
    /// placeholder.
    fn timeout(&self) -> Duration {
        (self.timeout + TIMEOUT_MARGIN) * self.subreddits.len().max(1) as u32
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let per_feed = self.per_feed(limit);
        let mut out = Vec::new();
        let mut feeds_ok = 0usize;

        for sub in &self.subreddits {
            let res = match fetch_within(self.http.as_ref(), self.request(sub, per_feed)).await {
                Ok(body) => Self::parse_items(body, per_feed as usize),
                Err(e) => Err(e),
            };
            match res {
                Ok(items) => {
                    feeds_ok += 1;
                    out.extend(items.into_iter().filter_map(NativeItem::into_candidate));
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", source = "reddit", subreddit = %sub, error = %e, "subreddit feed failed");
                }
            }
        }

        if feeds_ok == 0 {
            return Ok(vec![fallback_record(
                SourceId::Reddit,
                &FALLBACK,
                FallbackReason::AllFeedsFailed,
            )]);
        }
        Ok(out)
    }
}
