// src/ingest/providers/mod.rs
pub mod appsumo;
pub mod github;
pub mod moltbook;
pub mod producthunt;
pub mod reddit;
pub mod twitter;

use std::sync::Arc;

use crate::config::IngestConfig;
use crate::ingest::http::HttpFetch;
use crate::ingest::types::SourceAdapter;

/// The fixed registry that `"all"` expands to, in run order.
pub fn build_registry(cfg: &IngestConfig, http: Arc<dyn HttpFetch>) -> Vec<Arc<dyn SourceAdapter>> {
    let creds = &cfg.credentials;
    let timeout = cfg.default_timeout();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(github::GithubAdapter::new(
            http.clone(),
            creds.github_token.clone(),
            timeout,
        )),
        Arc::new(moltbook::MoltbookAdapter::new(
            http.clone(),
            creds.moltbook_api_key.clone(),
            timeout,
        )),
        Arc::new(reddit::RedditAdapter::new(
            http.clone(),
            cfg.reddit.subreddits.clone(),
            cfg.http.user_agent.clone(),
            cfg.reddit_timeout(),
        )),
        Arc::new(twitter::TwitterAdapter::new(
            http.clone(),
            creds.twitter_bearer_token.clone(),
            timeout,
        )),
        Arc::new(producthunt::ProductHuntAdapter::new(
            http.clone(),
            creds.producthunt_api_key.clone(),
            timeout,
        )),
        Arc::new(appsumo::AppSumoAdapter::new(
            http,
            cfg.http.user_agent.clone(),
            timeout,
        )),
    ];
    adapters
}
