// src/ingest/providers/appsumo.rs
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SourceFailure;
use crate::ingest::http::{fetch_within, HttpFetch, HttpRequest};
use crate::ingest::normalize::{
    fallback_record, FallbackContent, FallbackReason, NativeId, NativeItem,
};
use crate::ingest::types::{
    CandidateRecord, SignalDimensions, SourceAdapter, SourceId, TIMEOUT_MARGIN,
};

/// Public JSON behind the storefront; there is no documented API.
pub const DEALS_URL: &str = "https://appsumo.com/api/deals/";

pub const PROFILE: SignalDimensions =
    SignalDimensions::profile(70.0, 14.0, 75.0, 50.0, 60.0, 70.0, 75.0, 75.0);
pub const REVIEW_NORMALIZER: f64 = 100.0;
pub const DEFAULT_MOMENTUM: f64 = 50.0;
pub const DEFAULT_DESCRIPTION: &str = "AppSumo trending deal";

pub const FALLBACK: FallbackContent = FallbackContent {
    title: "AppSumo Trending Deals",
    description: "Trending deals from the AppSumo marketplace",
    url: "https://appsumo.com",
    signals: PROFILE,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealDetails {
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealCategory {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealRatings {
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub rating_count: Option<f64>,
}

/// Loosely-shaped deal; every field is optional on the storefront JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSumoDeal {
    #[serde(default)]
    pub id: Option<NativeId>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub details: Option<DealDetails>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<DealCategory>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub original_price: Option<Value>,
    #[serde(default)]
    pub ratings: Option<DealRatings>,
    #[serde(default)]
    pub trending_score: Option<f64>,
}

/// Either `{ "deals": [...] }` or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DealsPayload {
    Wrapped { deals: Vec<Value> },
    Bare(Vec<Value>),
}

/// Trending AppSumo deals. No credential; request and parse failures degrade
/// to the placeholder.
pub struct AppSumoAdapter {
    http: Arc<dyn HttpFetch>,
    user_agent: String,
    timeout: Duration,
}

impl AppSumoAdapter {
    pub fn new(http: Arc<dyn HttpFetch>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    fn request(&self, limit: u32) -> HttpRequest {
        HttpRequest::get(DEALS_URL)
            .header("User-Agent", self.user_agent.as_str())
            .query("sort", "trending")
            .query("limit", limit)
            .timeout(self.timeout)
    }

    /// `None` when the payload is not a deal list at all.
    pub fn parse_items(body: Value, limit: usize) -> Option<Vec<NativeItem>> {
        let deals = match serde_json::from_value::<DealsPayload>(body) {
            Ok(DealsPayload::Wrapped { deals }) | Ok(DealsPayload::Bare(deals)) => deals,
            Err(_) => return None,
        };
        let mut out = Vec::with_capacity(deals.len().min(limit));
        for raw in deals.into_iter().take(limit) {
            match serde_json::from_value::<AppSumoDeal>(raw) {
                Ok(deal) => out.push(NativeItem::AppSumo(deal)),
                Err(e) => {
                    tracing::debug!(target: "ingest", source = "appsumo", error = %e, "skipping malformed deal");
                }
            }
        }
        Some(out)
    }
}

#[async_trait]
impl SourceAdapter for AppSumoAdapter {
    fn source(&self) -> SourceId {
        SourceId::AppSumo
    }

    fn timeout(&self) -> Duration {
        self.timeout + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure> {
        let body = match fetch_within(self.http.as_ref(), self.request(limit)).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(target: "ingest", source = "appsumo", error = %e, "appsumo request failed, using fallback data");
                return Ok(vec![fallback_record(
                    SourceId::AppSumo,
                    &FALLBACK,
                    FallbackReason::RequestFailed,
                )]);
            }
        };

        match Self::parse_items(body, limit as usize) {
            Some(items) => Ok(items
                .into_iter()
                .filter_map(NativeItem::into_candidate)
                .collect()),
            None => {
                tracing::warn!(target: "ingest", source = "appsumo", "appsumo payload is not a deal list, using fallback data");
                Ok(vec![fallback_record(
                    SourceId::AppSumo,
                    &FALLBACK,
                    FallbackReason::ParseError,
                )])
            }
        }
    }
}
