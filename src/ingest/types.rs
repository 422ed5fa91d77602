// src/ingest/types.rs
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SourceFailure, UnknownSource};
use crate::scoring::Dimensions;

/// Default per-adapter request bound.
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(8);

/// Headroom the orchestrator adds on top of an adapter's own request bound,
/// so adapters that degrade on timeout get to return their placeholder.
pub const TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    #[serde(rename = "github")]
    GitHub,
    Moltbook,
    Reddit,
    Twitter,
    #[serde(rename = "producthunt")]
    ProductHunt,
    #[serde(rename = "appsumo")]
    AppSumo,
    /// Shown by the dashboard but has no adapter.
    #[serde(rename = "hackernews")]
    HackerNews,
}

impl SourceId {
    pub const ALL: [SourceId; 7] = [
        SourceId::GitHub,
        SourceId::Moltbook,
        SourceId::Reddit,
        SourceId::Twitter,
        SourceId::ProductHunt,
        SourceId::AppSumo,
        SourceId::HackerNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceId::GitHub => "github",
            SourceId::Moltbook => "moltbook",
            SourceId::Reddit => "reddit",
            SourceId::Twitter => "twitter",
            SourceId::ProductHunt => "producthunt",
            SourceId::AppSumo => "appsumo",
            SourceId::HackerNews => "hackernews",
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        SourceId::ALL
            .iter()
            .copied()
            .find(|id| id.as_str().eq_ignore_ascii_case(key))
            .ok_or_else(|| UnknownSource(key.to_string()))
    }
}

/// Per-source signal values. `None` means the adapter could not derive it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalDimensions {
    pub revenue_potential: Option<f64>,
    pub timeline_days: Option<f64>,
    pub skill_match: Option<f64>,
    pub momentum: Option<f64>,
    pub competition: Option<f64>,
    pub improvement_margin: Option<f64>,
    pub distribution_leverage: Option<f64>,
    pub margin_potential: Option<f64>,
}

impl SignalDimensions {
    /// A fully populated profile, used for per-source constants.
    #[allow(clippy::too_many_arguments)]
    pub const fn profile(
        revenue_potential: f64,
        timeline_days: f64,
        skill_match: f64,
        momentum: f64,
        competition: f64,
        improvement_margin: f64,
        distribution_leverage: f64,
        margin_potential: f64,
    ) -> Self {
        Self {
            revenue_potential: Some(revenue_potential),
            timeline_days: Some(timeline_days),
            skill_match: Some(skill_match),
            momentum: Some(momentum),
            competition: Some(competition),
            improvement_margin: Some(improvement_margin),
            distribution_leverage: Some(distribution_leverage),
            margin_potential: Some(margin_potential),
        }
    }

    pub fn with_momentum(mut self, momentum: f64) -> Self {
        self.momentum = Some(momentum);
        self
    }

    /// Fill gaps from the domain defaults and clamp into range.
    /// Non-finite values count as missing.
    pub fn resolve(&self) -> Dimensions {
        let d = Dimensions::DOMAIN_DEFAULT;
        fn pct(v: Option<f64>, default: f64) -> f64 {
            match v {
                Some(x) if x.is_finite() => x.clamp(0.0, 100.0),
                _ => default,
            }
        }
        let timeline_days = match self.timeline_days {
            Some(x) if x.is_finite() => x.max(0.0),
            _ => d.timeline_days,
        };
        Dimensions {
            revenue_potential: pct(self.revenue_potential, d.revenue_potential),
            timeline_days,
            skill_match: pct(self.skill_match, d.skill_match),
            momentum: pct(self.momentum, d.momentum),
            competition: pct(self.competition, d.competition),
            improvement_margin: pct(self.improvement_margin, d.improvement_margin),
            distribution_leverage: pct(self.distribution_leverage, d.distribution_leverage),
            margin_potential: pct(self.margin_potential, d.margin_potential),
        }
    }
}

/// Unscored, normalized item pulled from one source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub title: String,
    pub description: Option<String>,
    pub source: SourceId,
    pub source_url: String,
    pub source_id: String,
    pub raw_data: serde_json::Value,
    pub signals: SignalDimensions,
    /// Placeholder emitted when the source could not be queried.
    #[serde(default)]
    pub fallback: bool,
}

/// A fetch capability for one source. The orchestrator only sees this trait.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> SourceId;

    /// Upper bound on a whole `fetch` call.
    fn timeout(&self) -> Duration {
        DEFAULT_SOURCE_TIMEOUT + TIMEOUT_MARGIN
    }

    async fn fetch(&self, limit: u32) -> Result<Vec<CandidateRecord>, SourceFailure>;
}
