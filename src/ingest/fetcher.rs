// src/ingest/fetcher.rs
//! Pulls items out of each configured source, one listing at a time.
//!
//! Items come out in source-list order: a source's posts, then its comments,
//! then the next source. A listing is only requested once the consumer has
//! drained the previous one. Every item is offered to the stream buffer
//! before it is handed out; buffer trouble is logged and otherwise ignored.

use std::collections::VecDeque;
use std::sync::Arc;

use metrics::counter;

use crate::buffer::{StreamBuffer, TopicNames};
use crate::error::SourceError;
use crate::ingest::types::{ContentItem, ContentSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub posts: usize,
    pub comments: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            posts: 10,
            comments: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Posts,
    Comments,
}

pub struct SourceFetcher<'a> {
    client: &'a dyn ContentSource,
    sources: &'a [String],
    limits: FetchLimits,
    buffer: Option<(Arc<dyn StreamBuffer>, TopicNames)>,

    next_source: usize,
    stage: Stage,
    pending: VecDeque<ContentItem>,
    failed: Vec<String>,
    buffered: usize,
    buffer_errors: usize,
}

impl<'a> SourceFetcher<'a> {
    pub fn new(client: &'a dyn ContentSource, sources: &'a [String], limits: FetchLimits) -> Self {
        Self {
            client,
            sources,
            limits,
            buffer: None,
            next_source: 0,
            stage: Stage::Posts,
            pending: VecDeque::new(),
            failed: Vec::new(),
            buffered: 0,
            buffer_errors: 0,
        }
    }

    /// Forward every yielded item to `buffer` (posts and comments to their own topics).
    pub fn with_buffer(mut self, buffer: Arc<dyn StreamBuffer>, topics: TopicNames) -> Self {
        self.buffer = Some((buffer, topics));
        self
    }

    /// Next item, or `None` once every source is exhausted.
    pub async fn next_item(&mut self) -> Option<ContentItem> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                self.offer_to_buffer(&item).await;
                return Some(item);
            }
            if !self.load_next_listing().await {
                return None;
            }
        }
    }

    /// Sources that errored during this pass, in the order they failed.
    pub fn failed_sources(&self) -> &[String] {
        &self.failed
    }

    /// (appended, failed) buffer writes so far.
    pub fn buffer_counts(&self) -> (usize, usize) {
        (self.buffered, self.buffer_errors)
    }

    /// Fills `pending` from the next listing. Returns false when nothing is left to request.
    async fn load_next_listing(&mut self) -> bool {
        let Some(source) = self.sources.get(self.next_source) else {
            return false;
        };
        let source = source.clone();

        let fetched: Result<Vec<ContentItem>, SourceError> = match self.stage {
            Stage::Posts => self
                .client
                .new_posts(&source, self.limits.posts)
                .await
                .map(|v| v.into_iter().map(ContentItem::Post).collect()),
            Stage::Comments => self
                .client
                .new_comments(&source, self.limits.comments)
                .await
                .map(|v| v.into_iter().map(ContentItem::Comment).collect()),
        };

        match fetched {
            Ok(items) => {
                tracing::debug!(target: "fetcher", source = %source, stage = ?self.stage, count = items.len(), "listing fetched");
                let cap = match self.stage {
                    Stage::Posts => self.limits.posts,
                    Stage::Comments => self.limits.comments,
                };
                self.pending.extend(items.into_iter().take(cap));
                self.advance(false);
            }
            Err(e) => {
                tracing::warn!(target: "fetcher", error = %e, source = %source, client = self.client.name(), "source error, skipping rest of source");
                counter!("fetch_source_errors_total").increment(1);
                self.failed.push(source);
                self.advance(true);
            }
        }
        true
    }

    fn advance(&mut self, abandon_source: bool) {
        if self.stage == Stage::Posts && !abandon_source {
            self.stage = Stage::Comments;
        } else {
            self.stage = Stage::Posts;
            self.next_source += 1;
        }
    }

    async fn offer_to_buffer(&mut self, item: &ContentItem) {
        counter!("fetch_items_total", "kind" => item.kind().as_str()).increment(1);
        let Some((buffer, topics)) = &self.buffer else {
            return;
        };
        let topic = topics.for_kind(item.kind());
        match buffer.append(topic, item).await {
            Ok(_) => self.buffered += 1,
            Err(e) => {
                self.buffer_errors += 1;
                counter!("buffer_append_errors_total").increment(1);
                tracing::warn!(target: "fetcher", error = %e, topic, id = item.id(), "buffer append failed");
            }
        }
    }
}
