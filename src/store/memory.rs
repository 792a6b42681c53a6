// src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{
    ensure_key_matches, DocFilter, DocumentStore, FindQuery, SortOrder, UpsertOutcome,
};
use crate::error::StoreResult;
use crate::ingest::types::{EnrichedItem, ItemKey};

/// In-process store. A single write lock makes each upsert atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<HashMap<ItemKey, EnrichedItem>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert(&self, key: &ItemKey, doc: &EnrichedItem) -> StoreResult<UpsertOutcome> {
        ensure_key_matches(key, doc)?;
        let prev = self.docs.write().insert(key.clone(), doc.clone());
        Ok(match prev {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        })
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<EnrichedItem>> {
        Ok(self.docs.read().get(key).cloned())
    }

    async fn count(&self, filter: &DocFilter) -> StoreResult<u64> {
        Ok(self.docs.read().values().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<EnrichedItem>> {
        let mut hits: Vec<EnrichedItem> = self
            .docs
            .read()
            .values()
            .filter(|d| query.filter.matches(d))
            .cloned()
            .collect();
        // Tie-break on key so paging is stable.
        hits.sort_by(|a, b| {
            a.item
                .fetched_at()
                .cmp(&b.item.fetched_at())
                .then_with(|| a.key().cmp(&b.key()))
        });
        if query.sort == SortOrder::NewestFirst {
            hits.reverse();
        }
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(hits.into_iter().skip(query.skip).take(limit).collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
