// src/config.rs
//! Ingestion configuration.
//!
//! Credentials are resolved once at startup and injected into the adapters;
//! nothing downstream reads the process environment.
//!
//! Lookup order:
//! 1) $INGEST_CONFIG_PATH (must exist)
//! 2) config/ingest.toml
//! 3) config/ingest.json
//! 4) built-in defaults
//!
//! Then any credential still absent is taken from its env var. A credential
//! written as `"ENV"` in a file means the same thing.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::ingest::http::DEFAULT_USER_AGENT;

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";

pub const ENV_MOLTBOOK_API_KEY: &str = "MOLTBOOK_API_KEY";
pub const ENV_TWITTER_BEARER_TOKEN: &str = "TWITTER_BEARER_TOKEN";
pub const ENV_PRODUCTHUNT_API_KEY: &str = "PRODUCTHUNT_API_KEY";
pub const ENV_GITHUB_TOKEN: &str = "GITHUB_TOKEN";

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub moltbook_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
    pub producthunt_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn mask(v: &Option<String>) -> &'static str {
            if v.is_some() {
                "<set>"
            } else {
                "<unset>"
            }
        }
        f.debug_struct("Credentials")
            .field("moltbook_api_key", &mask(&self.moltbook_api_key))
            .field("twitter_bearer_token", &mask(&self.twitter_bearer_token))
            .field("producthunt_api_key", &mask(&self.producthunt_api_key))
            .field("github_token", &mask(&self.github_token))
            .finish()
    }
}

impl Credentials {
    /// Resolve `"ENV"` markers and gaps through `lookup`, drop blanks.
    pub fn resolve_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let slots: [(&mut Option<String>, &str); 4] = [
            (&mut self.moltbook_api_key, ENV_MOLTBOOK_API_KEY),
            (&mut self.twitter_bearer_token, ENV_TWITTER_BEARER_TOKEN),
            (&mut self.producthunt_api_key, ENV_PRODUCTHUNT_API_KEY),
            (&mut self.github_token, ENV_GITHUB_TOKEN),
        ];
        for (slot, var) in slots {
            let from_file = slot.take().map(|v| v.trim().to_string());
            let value = match from_file {
                Some(v) if v.eq_ignore_ascii_case("env") => lookup(var),
                Some(v) if !v.is_empty() => Some(v),
                _ => lookup(var),
            };
            *slot = value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub user_agent: String,
    pub default_timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            default_timeout_secs: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub subreddits: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            subreddits: vec![
                "entrepreneur".to_string(),
                "startups".to_string(),
                "SideProject".to_string(),
            ],
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Source name or `"all"`.
    pub source: String,
    pub limit: u32,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 6 * 3600,
            source: "all".to_string(),
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub credentials: Credentials,
    pub http: HttpSettings,
    pub reddit: RedditSettings,
    pub default_limit: u32,
    pub scheduler: SchedulerSettings,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            http: HttpSettings::default(),
            reddit: RedditSettings::default(),
            default_limit: 50,
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl IngestConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse_config(&content, &ext)
            .with_context(|| format!("parsing ingest config {}", path.display()))?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// File lookup without credential resolution.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
        let toml_p = PathBuf::from("config/ingest.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/ingest.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Config for the running process: files, then env credentials.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::load_default()?;
        cfg.credentials.resolve_with(|var| std::env::var(var).ok());
        Ok(cfg)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.http.default_timeout_secs)
    }

    pub fn reddit_timeout(&self) -> Duration {
        Duration::from_secs(self.reddit.timeout_secs)
    }

    fn sanitize(&mut self) {
        let defaults = Self::default();
        if self.default_limit == 0 {
            self.default_limit = defaults.default_limit;
        }
        if self.http.default_timeout_secs == 0 {
            self.http.default_timeout_secs = defaults.http.default_timeout_secs;
        }
        if self.http.user_agent.trim().is_empty() {
            self.http.user_agent = defaults.http.user_agent;
        }
        if self.reddit.timeout_secs == 0 {
            self.reddit.timeout_secs = defaults.reddit.timeout_secs;
        }
        self.reddit.subreddits = self
            .reddit
            .subreddits
            .iter()
            .map(|s| s.trim().trim_start_matches("r/").to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if self.reddit.subreddits.is_empty() {
            self.reddit.subreddits = defaults.reddit.subreddits;
        }
        if self.scheduler.interval_secs == 0 {
            self.scheduler.interval_secs = defaults.scheduler.interval_secs;
        }
        if self.scheduler.limit == 0 {
            self.scheduler.limit = defaults.scheduler.limit;
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if let Ok(v) = serde_json::from_str(s) {
                return Ok(v);
            }
            toml::from_str(s).map_err(|e| anyhow!("unsupported ingest config format: {e}"))
        }
    }
}
