// tests/providers_reddit.rs
use std::sync::Arc;
use std::time::Duration;

use arbitrage_engine::error::FetchError;
use arbitrage_engine::ingest::http::FixtureFetcher;
use arbitrage_engine::ingest::providers::reddit::{hot_url, RedditAdapter};
use arbitrage_engine::ingest::types::{SourceAdapter, SourceId};

const FIXTURE: &str = include_str!("fixtures/reddit_hot.json");

fn adapter(http: Arc<FixtureFetcher>, subs: &[&str]) -> RedditAdapter {
    RedditAdapter::new(
        http,
        subs.iter().map(|s| s.to_string()).collect(),
        "arbitrage-engine/test",
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn keeps_only_self_posts_with_body() {
    let http = Arc::new(FixtureFetcher::new().with_json_str(&hot_url("SaaS"), FIXTURE));
    let recs = adapter(http, &["SaaS"]).fetch(20).await.unwrap();

    assert_eq!(recs.len(), 1);
    let post = &recs[0];
    assert_eq!(post.source, SourceId::Reddit);
    assert_eq!(
        post.source_url,
        "https://reddit.com/r/SaaS/comments/1abc/i_built_a_tiny_saas/"
    );
    assert_eq!(
        post.description.as_deref(),
        Some("Here is how I found the niche & what I'd do again.")
    );
    assert_eq!(post.signals.momentum, Some(50.0));
    assert_eq!(post.raw_data["upvotes"], 400);
}

#[tokio::test]
async fn one_failing_feed_does_not_trigger_fallback() {
    let http = Arc::new(
        FixtureFetcher::new()
            .with_json_str(&hot_url("SaaS"), FIXTURE)
            .with_error(&hot_url("startups"), FetchError::Status { status: 429, body: String::new() }),
    );
    let recs = adapter(http.clone(), &["startups", "SaaS"]).fetch(20).await.unwrap();

    assert_eq!(recs.len(), 1);
    assert!(!recs[0].fallback);

    let calls = http.recorded();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].query_value("limit"), Some("10"));
    assert_eq!(calls[0].header_value("user-agent"), Some("arbitrage-engine/test"));
}

#[tokio::test]
async fn every_feed_failing_yields_single_fallback_record() {
    let http = Arc::new(FixtureFetcher::new());
    let recs = adapter(http, &["a", "b"]).fetch(20).await.unwrap();

    assert_eq!(recs.len(), 1);
    assert!(recs[0].fallback);
    assert_eq!(recs[0].source_id, "reddit_fallback");
    assert_eq!(recs[0].source_url, "https://reddit.com/r/entrepreneur");
}
