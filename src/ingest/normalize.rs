// src/ingest/normalize.rs
//! Single mapping step from native source items to [`CandidateRecord`].
//!
//! Adapters only decode their payloads into a [`NativeItem`]; everything that
//! turns a native shape into the common record (URLs, text cleanup, momentum,
//! per-source profiles) lives here.

use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::ingest::providers::{
    appsumo::{self, AppSumoDeal},
    github::{self, GithubRepo},
    moltbook::{self, MoltbookAgent},
    producthunt::{self, ProductHuntPost},
    reddit::{self, RedditPost},
    twitter::{self, Tweet, TwitterUser},
};
use crate::ingest::types::{CandidateRecord, SignalDimensions, SourceId};

/// Hard cap for any normalized text field.
const MAX_TEXT_CHARS: usize = 1500;

/// Clean up text from a source: entity decode, tag strip, quote folding,
/// whitespace collapse, then cap at `max_chars` characters.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    truncate_chars(&out, max_chars.min(MAX_TEXT_CHARS))
}

/// Char-boundary-safe prefix.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn clean_opt(s: Option<&str>, max_chars: usize) -> Option<String> {
    s.map(|v| normalize_text(v, max_chars))
        .filter(|v| !v.is_empty())
}

/// Engagement count mapped onto 0..100: `min(100, raw / normalizer * 100)`.
pub fn engagement_momentum(raw: f64, normalizer: f64) -> f64 {
    if !raw.is_finite() || normalizer <= 0.0 {
        return 0.0;
    }
    (raw / normalizer * 100.0).clamp(0.0, 100.0)
}

/// Ids come back as numbers from some APIs and strings from others.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeId {
    Num(i64),
    Text(String),
}

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeId::Num(n) => write!(f, "{n}"),
            NativeId::Text(s) => f.write_str(s),
        }
    }
}

/// One decoded item per source, before normalization.
#[derive(Clone, Debug)]
pub enum NativeItem {
    GitHub(GithubRepo),
    Moltbook(MoltbookAgent),
    Reddit(RedditPost),
    Twitter {
        tweet: Tweet,
        author: Option<TwitterUser>,
    },
    ProductHunt(ProductHuntPost),
    AppSumo(AppSumoDeal),
}

impl NativeItem {
    pub fn source(&self) -> SourceId {
        match self {
            NativeItem::GitHub(_) => SourceId::GitHub,
            NativeItem::Moltbook(_) => SourceId::Moltbook,
            NativeItem::Reddit(_) => SourceId::Reddit,
            NativeItem::Twitter { .. } => SourceId::Twitter,
            NativeItem::ProductHunt(_) => SourceId::ProductHunt,
            NativeItem::AppSumo(_) => SourceId::AppSumo,
        }
    }

    /// Map into the common shape. `None` when the item has no usable URL or title.
    pub fn into_candidate(self) -> Option<CandidateRecord> {
        let source = self.source();
        let rec = match self {
            NativeItem::GitHub(repo) => {
                let raw_data = serde_json::to_value(&repo).unwrap_or(Value::Null);
                CandidateRecord {
                    title: normalize_text(&repo.name, 300),
                    description: clean_opt(repo.description.as_deref(), MAX_TEXT_CHARS),
                    source,
                    source_url: repo.html_url,
                    source_id: repo.id.to_string(),
                    raw_data,
                    signals: github::PROFILE.with_momentum(engagement_momentum(
                        repo.stargazers_count as f64,
                        github::STAR_NORMALIZER,
                    )),
                    fallback: false,
                }
            }
            NativeItem::Moltbook(agent) => {
                let raw_data = serde_json::to_value(&agent).unwrap_or(Value::Null);
                let id = agent.id.to_string();
                let source_url = agent
                    .url
                    .filter(|u| !u.trim().is_empty())
                    .unwrap_or_else(|| format!("https://moltbook.com/{id}"));
                let momentum = agent
                    .usage_count
                    .map(|u| engagement_momentum(u, moltbook::USAGE_NORMALIZER))
                    .unwrap_or(moltbook::DEFAULT_MOMENTUM);
                CandidateRecord {
                    title: normalize_text(&agent.name, 300),
                    description: clean_opt(agent.description.as_deref(), MAX_TEXT_CHARS),
                    source,
                    source_url,
                    source_id: id,
                    raw_data,
                    signals: moltbook::PROFILE.with_momentum(momentum),
                    fallback: false,
                }
            }
            NativeItem::Reddit(post) => {
                let engagement = post.ups.max(0) as f64 + post.num_comments as f64;
                CandidateRecord {
                    title: normalize_text(&post.title, 300),
                    description: clean_opt(Some(post.selftext.as_str()), reddit::DESCRIPTION_CHARS),
                    source,
                    source_url: format!("https://reddit.com{}", post.permalink),
                    source_id: post.id.clone(),
                    raw_data: json!({
                        "subreddit": post.subreddit,
                        "upvotes": post.ups,
                        "comments": post.num_comments,
                        "created_utc": post.created_utc,
                    }),
                    signals: reddit::PROFILE.with_momentum(engagement_momentum(
                        engagement,
                        reddit::ENGAGEMENT_NORMALIZER,
                    )),
                    fallback: false,
                }
            }
            NativeItem::Twitter { tweet, author } => {
                let m = &tweet.public_metrics;
                let engagement = (m.like_count + m.retweet_count + m.reply_count) as f64;
                let source_url = match author.as_ref() {
                    Some(a) => format!("https://twitter.com/{}/status/{}", a.username, tweet.id),
                    None => format!("https://twitter.com/i/web/status/{}", tweet.id),
                };
                let text = normalize_text(&tweet.text, MAX_TEXT_CHARS);
                CandidateRecord {
                    title: truncate_chars(&text, twitter::TITLE_CHARS),
                    description: Some(text).filter(|t| !t.is_empty()),
                    source,
                    source_url,
                    source_id: tweet.id.clone(),
                    raw_data: json!({
                        "author": author.as_ref().map(|a| a.username.clone()),
                        "author_followers": author
                            .as_ref()
                            .and_then(|a| a.public_metrics.as_ref())
                            .map(|p| p.followers_count),
                        "engagement_metrics": tweet.public_metrics,
                        "created_at": tweet.created_at,
                    }),
                    signals: twitter::PROFILE.with_momentum(engagement_momentum(
                        engagement,
                        twitter::ENGAGEMENT_NORMALIZER,
                    )),
                    fallback: false,
                }
            }
            NativeItem::ProductHunt(post) => {
                let description = clean_opt(post.tagline.as_deref(), MAX_TEXT_CHARS)
                    .or_else(|| clean_opt(post.description.as_deref(), MAX_TEXT_CHARS));
                let makers: Vec<String> = post
                    .makers
                    .iter()
                    .filter_map(|m| m.username.clone())
                    .collect();
                CandidateRecord {
                    title: normalize_text(&post.name, 300),
                    description,
                    source,
                    source_url: post.url.clone(),
                    source_id: post.id.clone(),
                    raw_data: json!({
                        "votes": post.votes_count,
                        "comments": post.comments_count,
                        "reviews": post.reviews_count,
                        "makers": makers,
                    }),
                    signals: producthunt::PROFILE.with_momentum(engagement_momentum(
                        post.votes_count as f64,
                        producthunt::VOTE_NORMALIZER,
                    )),
                    fallback: false,
                }
            }
            NativeItem::AppSumo(deal) => {
                let slug = deal.slug.clone().filter(|s| !s.trim().is_empty());
                let source_url = match (deal.url.clone().filter(|u| !u.trim().is_empty()), &slug) {
                    (Some(u), _) => u,
                    (None, Some(s)) => format!("https://appsumo.com/products/{s}/"),
                    (None, None) => return None,
                };
                let source_id = deal
                    .id
                    .as_ref()
                    .map(NativeId::to_string)
                    .or(slug)
                    .unwrap_or_else(|| source_url.clone());
                let title = deal
                    .name
                    .as_deref()
                    .or(deal.title.as_deref())
                    .map(|t| normalize_text(t, 300))
                    .unwrap_or_default();
                let description = clean_opt(deal.description.as_deref(), MAX_TEXT_CHARS)
                    .or_else(|| {
                        clean_opt(
                            deal.details.as_ref().and_then(|d| d.summary.as_deref()),
                            MAX_TEXT_CHARS,
                        )
                    })
                    .or_else(|| Some(appsumo::DEFAULT_DESCRIPTION.to_string()));
                let rating_count = deal.ratings.as_ref().and_then(|r| r.rating_count);
                let momentum = match rating_count {
                    Some(n) if n > 0.0 => engagement_momentum(n, appsumo::REVIEW_NORMALIZER),
                    _ => appsumo::DEFAULT_MOMENTUM,
                };
                CandidateRecord {
                    title,
                    description,
                    source,
                    source_url,
                    source_id,
                    raw_data: json!({
                        "category": deal.category.as_ref().and_then(|c| c.name.clone()),
                        "price": deal.price,
                        "original_price": deal.original_price,
                        "rating": deal.ratings.as_ref().and_then(|r| r.rating),
                        "review_count": rating_count,
                        "trending_score": deal.trending_score,
                    }),
                    signals: appsumo::PROFILE.with_momentum(momentum),
                    fallback: false,
                }
            }
        };

        if rec.title.is_empty() || rec.source_url.trim().is_empty() {
            tracing::debug!(target: "ingest", source = %source, "dropping item without title or url");
            return None;
        }
        Some(rec)
    }
}

/// Fixed placeholder content for one source.
#[derive(Clone, Copy, Debug)]
pub struct FallbackContent {
    pub title: &'static str,
    pub description: &'static str,
    pub url: &'static str,
    pub signals: SignalDimensions,
}

/// Why a placeholder was emitted; also decides the `source_id` suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackReason {
    NotConfigured,
    RequestFailed,
    ParseError,
    AllFeedsFailed,
}

impl FallbackReason {
    fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::NotConfigured => "API not configured",
            FallbackReason::RequestFailed => "API request failed",
            FallbackReason::ParseError => "Parse error",
            FallbackReason::AllFeedsFailed => "All feeds failed",
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            FallbackReason::NotConfigured
            | FallbackReason::ParseError
            | FallbackReason::AllFeedsFailed => "fallback",
            FallbackReason::RequestFailed => "fallback_error",
        }
    }
}

/// Build the single clearly-marked placeholder a source returns when it
/// cannot produce real items.
pub fn fallback_record(
    source: SourceId,
    content: &FallbackContent,
    reason: FallbackReason,
) -> CandidateRecord {
    metrics::counter!("ingest_fallback_records_total", "source" => source.as_str())
        .increment(1);
    CandidateRecord {
        title: content.title.to_string(),
        description: Some(content.description.to_string()),
        source,
        source_url: content.url.to_string(),
        source_id: format!("{}_{}", source.as_str(), reason.suffix()),
        raw_data: json!({ "fallback": true, "reason": reason.as_str() }),
        signals: content.signals,
        fallback: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_strips_markup_and_collapses_ws() {
        let s = "  <p>Ship&nbsp;it &amp; <b>grow</b></p>\n\n “fast” ";
        assert_eq!(normalize_text(s, 100), r#"Ship it & grow "fast""#);
    }

    #[test]
    fn normalize_text_keeps_angle_brackets_that_are_not_tags() {
        assert_eq!(normalize_text("stars:>100 and 3 < 5", 100), "stars:>100 and 3 < 5");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_chars("héllo wörld", 7), "héllo w");
        assert_eq!(normalize_text("ábcdef", 3), "ábc");
    }

    #[test]
    fn momentum_is_capped_and_linear() {
        assert_eq!(engagement_momentum(5_000.0, 10_000.0), 50.0);
        assert_eq!(engagement_momentum(50_000.0, 10_000.0), 100.0);
        assert_eq!(engagement_momentum(-5.0, 100.0), 0.0);
        assert_eq!(engagement_momentum(5.0, 0.0), 0.0);
    }

    #[test]
    fn native_ids_display_without_quotes() {
        let n: NativeId = serde_json::from_str("42").unwrap();
        let s: NativeId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(n.to_string(), "42");
        assert_eq!(s.to_string(), "abc");
    }

    #[test]
    fn fallback_records_are_tagged() {
        let rec = fallback_record(
            SourceId::Twitter,
            &twitter::FALLBACK,
            FallbackReason::NotConfigured,
        );
        assert!(rec.fallback);
        assert_eq!(rec.source_id, "twitter_fallback");
        assert_eq!(rec.raw_data["fallback"], json!(true));

        let err = fallback_record(
            SourceId::Twitter,
            &twitter::FALLBACK,
            FallbackReason::RequestFailed,
        );
        assert_eq!(err.source_id, "twitter_fallback_error");
        assert_eq!(err.source_url, rec.source_url);
    }
}
