// src/store/mod.rs
//! Persistent document store for enriched items.
//!
//! Documents are keyed by `(external id, kind)`. `upsert` inserts when the key
//! is new and otherwise overwrites the whole document (last writer wins, no
//! merge), which makes redelivered or re-fetched items safe to store again.

pub mod live;
pub mod memory;
pub mod sqlite;

use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

use crate::error::{StoreError, StoreResult};
use crate::ingest::types::{EnrichedItem, ItemKey, ItemKind};

pub use live::LiveFeed;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Whether an upsert created a document or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Conjunctive document filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocFilter {
    pub kind: Option<ItemKind>,
    pub subreddit: Option<String>,
    /// Inclusive lower bound on `fetched_at`. Stores may compare at a coarser
    /// precision (SQLite keeps milliseconds) and return a few earlier items.
    pub fetched_since: Option<DateTime<Utc>>,
}

impl DocFilter {
    pub fn kind(kind: ItemKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    pub fn since(mut self, ts: DateTime<Utc>) -> Self {
        self.fetched_since = Some(ts);
        self
    }

    pub fn matches(&self, doc: &EnrichedItem) -> bool {
        if let Some(k) = self.kind {
            if doc.item.kind() != k {
                return false;
            }
        }
        if let Some(s) = &self.subreddit {
            if doc.item.subreddit() != s {
                return false;
            }
        }
        if let Some(ts) = self.fetched_since {
            if doc.item.fetched_at() < ts {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Find with filter, sort by `fetched_at`, skip and limit.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub filter: DocFilter,
    pub sort: SortOrder,
    pub skip: usize,
    pub limit: Option<usize>,
}

#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert-or-overwrite. `key` must be the document's own key.
    async fn upsert(&self, key: &ItemKey, doc: &EnrichedItem) -> StoreResult<UpsertOutcome>;
    async fn get(&self, key: &ItemKey) -> StoreResult<Option<EnrichedItem>>;
    async fn count(&self, filter: &DocFilter) -> StoreResult<u64>;
    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<EnrichedItem>>;
    fn name(&self) -> &'static str;
}

pub(crate) fn ensure_key_matches(key: &ItemKey, doc: &EnrichedItem) -> StoreResult<()> {
    if *key != doc.key() {
        return Err(StoreError::Backend(format!(
            "key {}:{} does not match document {}:{}",
            key.kind,
            key.id,
            doc.item.kind(),
            doc.item.id()
        )));
    }
    Ok(())
}

/// Write side used by the pipeline: derives the key from the document.
#[derive(Clone)]
pub struct StorageSink {
    store: Arc<dyn DocumentStore>,
}

impl StorageSink {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn upsert(&self, doc: &EnrichedItem) -> StoreResult<UpsertOutcome> {
        self.store.upsert(&doc.key(), doc).await
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }
}

/// Snapshot of what the store holds, for status reporting.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct StoreStats {
    pub total_posts: u64,
    pub total_comments: u64,
    pub posts_last_10m: u64,
    pub comments_last_10m: u64,
    pub posts_last_5m: u64,
    pub comments_last_5m: u64,
    pub latest_fetch: Option<DateTime<Utc>>,
}

pub async fn store_stats(store: &dyn DocumentStore, now: DateTime<Utc>) -> StoreResult<StoreStats> {
    let ten = now - ChronoDuration::minutes(10);
    let five = now - ChronoDuration::minutes(5);

    let latest = store
        .find(&FindQuery {
            limit: Some(1),
            ..FindQuery::default()
        })
        .await?;

    Ok(StoreStats {
        total_posts: store.count(&DocFilter::kind(ItemKind::Post)).await?,
        total_comments: store.count(&DocFilter::kind(ItemKind::Comment)).await?,
        posts_last_10m: store.count(&DocFilter::kind(ItemKind::Post).since(ten)).await?,
        comments_last_10m: store
            .count(&DocFilter::kind(ItemKind::Comment).since(ten))
            .await?,
        posts_last_5m: store.count(&DocFilter::kind(ItemKind::Post).since(five)).await?,
        comments_last_5m: store
            .count(&DocFilter::kind(ItemKind::Comment).since(five))
            .await?,
        latest_fetch: latest.first().map(|d| d.item.fetched_at()),
    })
}
