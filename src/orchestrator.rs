// src/orchestrator.rs
//! One ingestion cycle: fetch -> filter -> enrich -> upsert.
//!
//! Nothing below the cycle is allowed to fail it. Source errors, classifier
//! errors, buffer errors and per-item storage errors are all logged, counted
//! in `CycleStats` and absorbed.

use std::sync::Arc;
use std::time::Instant;

use chrono::{SubsecRound, Utc};
use metrics::{counter, gauge, histogram};
use serde::Serialize;

use crate::analyze::Enricher;
use crate::buffer::{topic_lengths, MessageId, StreamBuffer, TopicNames};
use crate::error::{BufferError, BufferResult};
use crate::ingest::fetcher::{FetchLimits, SourceFetcher};
use crate::ingest::filter::{ContentFilter, DropReason};
use crate::ingest::types::{ContentItem, ContentSource, ItemKind};
use crate::store::{StorageSink, UpsertOutcome};

/// Counters for one cycle (or one replay). Built fresh every time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleStats {
    pub posts_processed: u64,
    pub comments_processed: u64,
    pub filtered_bot: u64,
    pub filtered_spam: u64,
    /// Newly inserted documents.
    pub posts_stored: u64,
    pub comments_stored: u64,
    /// Documents that already existed and were overwritten.
    pub posts_updated: u64,
    pub comments_updated: u64,
    pub storage_failures: u64,
    pub failed_sources: Vec<String>,
    pub buffer_enabled: bool,
    pub buffered: u64,
    pub buffer_errors: u64,
    pub duration_ms: u64,
}

impl CycleStats {
    pub fn processed(&self) -> u64 {
        self.posts_processed + self.comments_processed
    }

    pub fn filtered(&self) -> u64 {
        self.filtered_bot + self.filtered_spam
    }

    pub fn stored(&self) -> u64 {
        self.posts_stored + self.comments_stored
    }

    pub fn updated(&self) -> u64 {
        self.posts_updated + self.comments_updated
    }

    /// New documents over processed items; 0.0 when nothing was processed.
    pub fn success_rate(&self) -> f64 {
        match self.processed() {
            0 => 0.0,
            n => self.stored() as f64 / n as f64,
        }
    }
}

pub struct Orchestrator {
    filter: ContentFilter,
    enricher: Arc<Enricher>,
    sink: StorageSink,
    buffer: Option<Arc<dyn StreamBuffer>>,
    topics: TopicNames,
    limits: FetchLimits,
}

impl Orchestrator {
    pub fn new(enricher: Arc<Enricher>, sink: StorageSink) -> Self {
        Self {
            filter: ContentFilter::new(),
            enricher,
            sink,
            buffer: None,
            topics: TopicNames::default(),
            limits: FetchLimits::default(),
        }
    }

    pub fn with_buffer(mut self, buffer: Arc<dyn StreamBuffer>, topics: TopicNames) -> Self {
        self.buffer = Some(buffer);
        self.topics = topics;
        self
    }

    pub fn with_limits(mut self, limits: FetchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Runs one full cycle over `sources`. Safe to call repeatedly.
    pub async fn run_cycle(&self, sources: &[String], client: &dyn ContentSource) -> CycleStats {
        let started = Instant::now();
        let mut stats = CycleStats::default();

        let buffer = match &self.buffer {
            Some(b) => {
                if b.health().await {
                    Some(b.clone())
                } else {
                    tracing::warn!(target: "cycle", buffer = b.name(), "buffer unhealthy, running without it");
                    counter!("buffer_unavailable_total").increment(1);
                    None
                }
            }
            None => None,
        };
        stats.buffer_enabled = buffer.is_some();

        tracing::info!(
            target: "cycle",
            sources = sources.len(),
            client = client.name(),
            buffered = stats.buffer_enabled,
            "cycle started"
        );

        let mut fetcher = SourceFetcher::new(client, sources, self.limits);
        if let Some(b) = &buffer {
            fetcher = fetcher.with_buffer(b.clone(), self.topics.clone());
        }

        while let Some(item) = fetcher.next_item().await {
            self.process(item, &mut stats).await;
        }

        stats.failed_sources = fetcher.failed_sources().to_vec();
        let (buffered, buffer_errors) = fetcher.buffer_counts();
        stats.buffered = buffered as u64;
        stats.buffer_errors = buffer_errors as u64;
        stats.duration_ms = started.elapsed().as_millis() as u64;

        histogram!("cycle_duration_ms").record(stats.duration_ms as f64);
        gauge!("cycle_success_rate").set(stats.success_rate());
        gauge!("cycle_last_run_ts").set(Utc::now().timestamp() as f64);
        counter!("cycles_total").increment(1);

        let rate = format!("{:.1}%", stats.success_rate() * 100.0);
        tracing::info!(
            target: "cycle",
            duration_ms = stats.duration_ms,
            processed = stats.processed(),
            posts_processed = stats.posts_processed,
            posts_stored = stats.posts_stored,
            comments_processed = stats.comments_processed,
            comments_stored = stats.comments_stored,
            updated = stats.updated(),
            filtered = stats.filtered(),
            storage_failures = stats.storage_failures,
            failed_sources = stats.failed_sources.len(),
            success_rate = %rate,
            "cycle summary"
        );
        if let Some(b) = &buffer {
            for (topic, len) in topic_lengths(b.as_ref(), &self.topics).await {
                tracing::info!(target: "cycle", topic = %topic, length = len, "buffer topic");
            }
        }

        stats
    }

    /// Re-processes up to `max_count` messages from the start of `topic`.
    /// Re-running it is harmless: upserts overwrite by key.
    pub async fn replay(&self, topic: &str, max_count: usize) -> BufferResult<CycleStats> {
        let buffer = self
            .buffer
            .as_ref()
            .ok_or_else(|| BufferError::Unavailable("no buffer configured".into()))?;

        let started = Instant::now();
        let mut stats = CycleStats {
            buffer_enabled: true,
            ..CycleStats::default()
        };

        let messages = buffer
            .read(topic, MessageId::START, max_count, std::time::Duration::ZERO)
            .await?;
        let last = messages.last().map(|m| m.id);
        for msg in messages {
            self.process(msg.payload, &mut stats).await;
        }

        stats.duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            target: "replay",
            topic,
            last_id = ?last,
            processed = stats.processed(),
            stored = stats.stored(),
            updated = stats.updated(),
            filtered = stats.filtered(),
            "replay finished"
        );
        Ok(stats)
    }

    async fn process(&self, mut item: ContentItem, stats: &mut CycleStats) {
        let kind = item.kind();
        match kind {
            ItemKind::Post => stats.posts_processed += 1,
            ItemKind::Comment => stats.comments_processed += 1,
        }
        counter!("items_processed_total", "kind" => kind.as_str()).increment(1);

        let text = item.combined_text();
        if let Some(reason) = self.filter.check(item.author(), &text) {
            match reason {
                DropReason::Bot => stats.filtered_bot += 1,
                DropReason::Spam => stats.filtered_spam += 1,
            }
            counter!("items_filtered_total", "reason" => reason.as_str()).increment(1);
            tracing::debug!(target: "cycle", id = item.id(), kind = %kind, reason = reason.as_str(), "filtered");
            return;
        }

        // Millisecond stamps: the same precision the SQLite store keeps.
        item.set_fetched_at(Utc::now().trunc_subsecs(3));
        let doc = self.enricher.enrich(item, &text).await;

        match self.sink.upsert(&doc).await {
            Ok(UpsertOutcome::Inserted) => {
                match kind {
                    ItemKind::Post => stats.posts_stored += 1,
                    ItemKind::Comment => stats.comments_stored += 1,
                }
                counter!("store_upserts_total", "outcome" => "inserted").increment(1);
                tracing::debug!(target: "cycle", id = doc.item.id(), kind = %kind, subreddit = doc.item.subreddit(), "new");
            }
            Ok(UpsertOutcome::Updated) => {
                match kind {
                    ItemKind::Post => stats.posts_updated += 1,
                    ItemKind::Comment => stats.comments_updated += 1,
                }
                counter!("store_upserts_total", "outcome" => "updated").increment(1);
                tracing::debug!(target: "cycle", id = doc.item.id(), kind = %kind, subreddit = doc.item.subreddit(), "updated");
            }
            Err(e) => {
                stats.storage_failures += 1;
                counter!("store_errors_total").increment(1);
                tracing::warn!(target: "cycle", error = %e, id = doc.item.id(), kind = %kind, "storing failed, item dropped");
            }
        }
    }
}
