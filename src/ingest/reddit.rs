// src/ingest/reddit.rs
//! Reddit listing client (application-only OAuth, read-only).
//!
//! Posts come from `/r/{sub}/new`, comments from `/r/{sub}/comments`, both in
//! Reddit's native newest-first order. Listings are paged with `after` when a
//! limit exceeds one page.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::SourceError;
use crate::ingest::types::{Comment, ContentSource, Post};

pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit never returns more than this per listing request.
const PAGE_MAX: usize = 100;

#[derive(Debug, Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

pub struct RedditClient {
    http: reqwest::Client,
    creds: RedditCredentials,
    auth_url: String,
    api_base: String,
    token: Mutex<Option<CachedToken>>,
}

impl RedditClient {
    pub fn new(creds: RedditCredentials) -> Result<Self, SourceError> {
        Self::with_endpoints(creds, DEFAULT_AUTH_URL, DEFAULT_API_BASE)
    }

    /// Point the client at other endpoints (local proxies, test servers).
    pub fn with_endpoints(
        creds: RedditCredentials,
        auth_url: &str,
        api_base: &str,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent(creds.user_agent.clone())
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| SourceError::Auth(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            creds,
            auth_url: auth_url.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, SourceError> {
        let mut guard = self.token.lock().await;
        if let Some(tok) = guard.as_ref() {
            if tok.expires_at > Instant::now() {
                return Ok(tok.value.clone());
            }
        }

        #[derive(Deserialize)]
        struct TokenResp {
            access_token: String,
            #[serde(default = "default_expiry")]
            expires_in: u64,
        }
        fn default_expiry() -> u64 {
            3600
        }

        let resp = self
            .http
            .post(&self.auth_url)
            .basic_auth(&self.creds.client_id, Some(&self.creds.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SourceError::Auth(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SourceError::Auth(format!("token status {}", resp.status())));
        }
        let body: TokenResp = resp
            .json()
            .await
            .map_err(|e| SourceError::Auth(format!("token payload: {e}")))?;

        // Refresh a minute early so a listing never races the expiry.
        let ttl = body.expires_in.saturating_sub(60).max(1);
        let value = body.access_token;
        *guard = Some(CachedToken {
            value: value.clone(),
            expires_at: Instant::now() + Duration::from_secs(ttl),
        });
        tracing::debug!(target: "reddit", ttl_secs = ttl, "access token refreshed");
        Ok(value)
    }

    async fn listing(
        &self,
        source: &str,
        path: &str,
        limit: usize,
    ) -> Result<Vec<Thing>, SourceError> {
        let mut out: Vec<Thing> = Vec::with_capacity(limit.min(PAGE_MAX));
        let mut after: Option<String> = None;

        while out.len() < limit {
            let page = (limit - out.len()).min(PAGE_MAX);
            let token = self.access_token().await?;
            let url = format!("{}/r/{}/{}", self.api_base, source, path);

            let mut query: Vec<(&str, String)> = vec![("limit", page.to_string())];
            if let Some(a) = &after {
                query.push(("after", a.clone()));
            }

            let t0 = Instant::now();
            let resp = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&query)
                .send()
                .await
                .map_err(|e| SourceError::Http {
                    source_name: source.to_string(),
                    message: e.to_string(),
                })?;
            histogram!("reddit_request_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

            let status = resp.status();
            if !status.is_success() {
                counter!("reddit_http_errors_total").increment(1);
                return Err(SourceError::Status {
                    source_name: source.to_string(),
                    status: status.as_u16(),
                });
            }
            let body = resp.text().await.map_err(|e| SourceError::Http {
                source_name: source.to_string(),
                message: e.to_string(),
            })?;
            let listing = parse_listing(&body).map_err(|e| SourceError::Decode {
                source_name: source.to_string(),
                message: e.to_string(),
            })?;

            let got = listing.data.children.len();
            out.extend(listing.data.children);
            after = listing.data.after;
            if got == 0 || after.is_none() {
                break;
            }
        }

        out.truncate(limit);
        Ok(out)
    }
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn new_posts(&self, source: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        let now = Utc::now();
        let things = self.listing(source, "new", limit).await?;
        Ok(things
            .into_iter()
            .filter_map(|t| t.into_post(source, now))
            .collect())
    }

    async fn new_comments(&self, source: &str, limit: usize) -> Result<Vec<Comment>, SourceError> {
        let now = Utc::now();
        let things = self.listing(source, "comments", limit).await?;
        Ok(things
            .into_iter()
            .filter_map(|t| t.into_comment(source, now))
            .collect())
    }

    fn name(&self) -> &'static str {
        "reddit"
    }
}

// ------------------------------------------------------------
// Wire format
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    after: Option<String>,
    #[serde(default)]
    children: Vec<Thing>,
}

#[derive(Debug, Deserialize)]
struct Thing {
    kind: String,
    data: ThingData,
}

#[derive(Debug, Default, Deserialize)]
struct ThingData {
    id: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    selftext: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_utc: f64,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    link_id: Option<String>,
}

pub(crate) fn parse_listing(body: &str) -> Result<Listing, serde_json::Error> {
    serde_json::from_str(body)
}

/// Deleted accounts come back as "[deleted]"; treat them as missing.
fn clean_author(a: Option<String>) -> Option<String> {
    a.filter(|s| !s.is_empty() && s != "[deleted]")
}

/// Listing text is HTML-escaped (`&amp;`, `&gt;`); decode it once here.
fn clean_text(s: Option<String>) -> String {
    s.map(|t| html_escape::decode_html_entities(&t).to_string())
        .unwrap_or_default()
}

fn to_datetime(secs: f64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs.max(0.0) as i64, 0)
        .single()
        .unwrap_or_default()
}

fn strip_fullname(s: &str) -> &str {
    s.split_once('_').map(|(_, id)| id).unwrap_or(s)
}

impl Thing {
    fn into_post(self, source: &str, now: DateTime<Utc>) -> Option<Post> {
        if self.kind != "t3" {
            return None;
        }
        let d = self.data;
        Some(Post {
            id: d.id,
            subreddit: source.to_string(),
            author: clean_author(d.author),
            title: clean_text(d.title),
            body: clean_text(d.selftext),
            created_utc: to_datetime(d.created_utc),
            score: d.score,
            url: d.url.unwrap_or_default(),
            num_comments: d.num_comments,
            fetched_at: now,
        })
    }

    fn into_comment(self, source: &str, now: DateTime<Utc>) -> Option<Comment> {
        if self.kind != "t1" {
            return None;
        }
        let d = self.data;
        let link = d.link_id.unwrap_or_default();
        Some(Comment {
            id: d.id,
            subreddit: source.to_string(),
            author: clean_author(d.author),
            body: clean_text(d.body),
            created_utc: to_datetime(d.created_utc),
            score: d.score,
            post_id: strip_fullname(&link).to_string(),
            parent_id: d.parent_id.unwrap_or_default(),
            fetched_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POSTS: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_b2",
            "children": [
                {"kind": "t3", "data": {"id": "a1", "author": "alice", "title": "Fish &amp; chips",
                 "selftext": "tasty", "created_utc": 1700000000.0, "url": "https://x.test/a1",
                 "score": 10, "num_comments": 2}},
                {"kind": "t3", "data": {"id": "b2", "author": "[deleted]", "title": "gone",
                 "selftext": "", "created_utc": 1700000001.0, "score": 0, "num_comments": 0}}
            ]
        }
    }"#;

    const COMMENTS: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": null,
            "children": [
                {"kind": "t1", "data": {"id": "c9", "author": "bob", "body": "a &gt; b",
                 "created_utc": 1700000100.5, "score": 4, "parent_id": "t1_c8", "link_id": "t3_a1"}}
            ]
        }
    }"#;

    #[test]
    fn posts_are_decoded_in_listing_order() {
        let now = Utc::now();
        let listing = parse_listing(POSTS).unwrap();
        assert_eq!(listing.data.after.as_deref(), Some("t3_b2"));
        let posts: Vec<Post> = listing
            .data
            .children
            .into_iter()
            .filter_map(|t| t.into_post("food", now))
            .collect();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].id, "a1");
        assert_eq!(posts[0].title, "Fish & chips");
        assert_eq!(posts[0].subreddit, "food");
        assert_eq!(posts[0].created_utc.timestamp(), 1_700_000_000);
        assert_eq!(posts[1].author, None);
    }

    #[test]
    fn comments_resolve_owning_post() {
        let now = Utc::now();
        let listing = parse_listing(COMMENTS).unwrap();
        let comments: Vec<Comment> = listing
            .data
            .children
            .into_iter()
            .filter_map(|t| t.into_comment("food", now))
            .collect();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].post_id, "a1");
        assert_eq!(comments[0].parent_id, "t1_c8");
        assert_eq!(comments[0].body, "a > b");
    }

    #[test]
    fn wrong_kind_is_skipped() {
        let now = Utc::now();
        let listing = parse_listing(COMMENTS).unwrap();
        let posts: Vec<Post> = listing
            .data
            .children
            .into_iter()
            .filter_map(|t| t.into_post("food", now))
            .collect();
        assert!(posts.is_empty());
    }
}
