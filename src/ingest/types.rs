// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// Which variant an item is. Half of the composite identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Post,
    Comment,
}

impl ItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Post => "post",
            ItemKind::Comment => "comment",
        }
    }
}

impl std::fmt::Display for ItemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite identity `(external id, kind)`. Never changes once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub id: String,
    pub kind: ItemKind,
}

impl ItemKey {
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub title: String,
    pub body: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
    pub url: String,
    pub num_comments: u64,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub subreddit: String,
    pub author: Option<String>,
    pub body: String,
    pub created_utc: DateTime<Utc>,
    pub score: i64,
    /// Id of the post this comment belongs to (no `t3_` prefix).
    pub post_id: String,
    /// Raw parent fullname: `t3_<post>` for top-level comments, `t1_<comment>` for replies.
    pub parent_id: String,
    pub fetched_at: DateTime<Utc>,
}

/// One post or comment pulled from the external source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Post(Post),
    Comment(Comment),
}

impl ContentItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ContentItem::Post(_) => ItemKind::Post,
            ContentItem::Comment(_) => ItemKind::Comment,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.id,
            ContentItem::Comment(c) => &c.id,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.id(), self.kind())
    }

    pub fn subreddit(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.subreddit,
            ContentItem::Comment(c) => &c.subreddit,
        }
    }

    pub fn author(&self) -> Option<&str> {
        match self {
            ContentItem::Post(p) => p.author.as_deref(),
            ContentItem::Comment(c) => c.author.as_deref(),
        }
    }

    pub fn body(&self) -> &str {
        match self {
            ContentItem::Post(p) => &p.body,
            ContentItem::Comment(c) => &c.body,
        }
    }

    pub fn score(&self) -> i64 {
        match self {
            ContentItem::Post(p) => p.score,
            ContentItem::Comment(c) => c.score,
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            ContentItem::Post(p) => p.fetched_at,
            ContentItem::Comment(c) => c.fetched_at,
        }
    }

    pub fn set_fetched_at(&mut self, ts: DateTime<Utc>) {
        match self {
            ContentItem::Post(p) => p.fetched_at = ts,
            ContentItem::Comment(c) => c.fetched_at = ts,
        }
    }

    /// Text used for filtering and classification: `title + " " + body` for
    /// posts, the body for comments.
    pub fn combined_text(&self) -> String {
        match self {
            ContentItem::Post(p) => format!("{} {}", p.title, p.body),
            ContentItem::Comment(c) => c.body.clone(),
        }
    }
}

/// A content item plus its labels. This is the stored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedItem {
    #[serde(flatten)]
    pub item: ContentItem,
    pub emotion: Option<String>,
    pub intent: Option<String>,
    pub sarcasm: Option<bool>,
}

impl EnrichedItem {
    /// Wrap an item with no labels yet.
    pub fn bare(item: ContentItem) -> Self {
        Self {
            item,
            emotion: None,
            intent: None,
            sarcasm: None,
        }
    }

    pub fn key(&self) -> ItemKey {
        self.item.key()
    }
}

/// Read-only client for the external content source. Every call is fallible
/// and callers are expected to absorb errors per source.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Newest posts of `source`, in the source's native order.
    async fn new_posts(&self, source: &str, limit: usize) -> Result<Vec<Post>, SourceError>;
    /// Newest comments across `source`, in the source's native order.
    async fn new_comments(&self, source: &str, limit: usize) -> Result<Vec<Comment>, SourceError>;
    fn name(&self) -> &'static str;
}
