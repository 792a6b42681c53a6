// src/store/live.rs
//! "Items newer than cursor" poller.
//!
//! The cursor is inclusive, so items sharing the boundary timestamp come back
//! on the next poll. Each item is emitted once per version: an identity is
//! remembered together with the `fetched_at` it was emitted with, and only a
//! later `fetched_at` (the item was stored again) emits it again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{DocFilter, DocumentStore, FindQuery, SortOrder};
use crate::error::StoreResult;
use crate::ingest::types::{EnrichedItem, ItemKey};

pub struct LiveFeed {
    store: Arc<dyn DocumentStore>,
    cursor: DateTime<Utc>,
    emitted: HashMap<ItemKey, DateTime<Utc>>,
}

impl LiveFeed {
    /// Starts emitting items fetched at or after `since`.
    pub fn new(store: Arc<dyn DocumentStore>, since: DateTime<Utc>) -> Self {
        Self {
            store,
            cursor: since,
            emitted: HashMap::new(),
        }
    }

    pub fn cursor(&self) -> DateTime<Utc> {
        self.cursor
    }

    /// Up to `max` not-yet-emitted items, oldest first.
    pub async fn poll(&mut self, max: usize) -> StoreResult<Vec<EnrichedItem>> {
        let candidates = self
            .store
            .find(&FindQuery {
                filter: DocFilter::default().since(self.cursor),
                sort: SortOrder::OldestFirst,
                skip: 0,
                limit: None,
            })
            .await?;

        let mut out = Vec::new();
        for doc in candidates {
            if out.len() >= max {
                break;
            }
            let key = doc.key();
            let ts = doc.item.fetched_at();
            // The store may match the cursor coarsely; forgotten items older
            // than the cursor would otherwise come back.
            if ts < self.cursor {
                continue;
            }
            if self.emitted.get(&key).is_some_and(|seen| *seen >= ts) {
                continue;
            }
            self.emitted.insert(key, ts);
            out.push(doc);
        }

        if let Some(last) = out.last() {
            self.cursor = self.cursor.max(last.item.fetched_at());
        }
        // Anything strictly older than the cursor can never be returned again.
        let cursor = self.cursor;
        self.emitted.retain(|_, ts| *ts >= cursor);
        Ok(out)
    }
}
