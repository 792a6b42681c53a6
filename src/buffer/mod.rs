// src/buffer/mod.rs
//! Durable per-topic append log that sits beside the fetch path.
//!
//! The buffer hands out monotonically increasing ids per topic and reads from
//! a caller-supplied cursor. It keeps no consumer offsets: reading twice from
//! `MessageId::START` returns the same messages twice. It is a transport, never
//! the system of record, and nothing on the fetch path may fail because of it.

pub mod file;
pub mod memory;

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::BufferResult;
use crate::ingest::types::{ContentItem, ItemKind};

pub use file::FileBuffer;
pub use memory::MemoryBuffer;

/// Buffer-assigned id, unique and increasing within one topic. Ids start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Initial cursor: reads from the beginning of a topic.
    pub const START: MessageId = MessageId(0);
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport envelope around one fetched item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: MessageId,
    pub produced_at: DateTime<Utc>,
    pub payload: ContentItem,
}

#[async_trait::async_trait]
pub trait StreamBuffer: Send + Sync {
    async fn append(&self, topic: &str, payload: &ContentItem) -> BufferResult<MessageId>;

    /// Up to `max_count` messages with `id >= cursor`, oldest first. When none
    /// are available, waits up to `block` for an append before returning.
    async fn read(
        &self,
        topic: &str,
        cursor: MessageId,
        max_count: usize,
        block: Duration,
    ) -> BufferResult<Vec<StreamMessage>>;

    async fn length(&self, topic: &str) -> BufferResult<usize>;

    /// Drops all messages of a topic. Ids keep increasing afterwards.
    async fn clear(&self, topic: &str) -> BufferResult<()>;

    /// Liveness probe. Never errors.
    async fn health(&self) -> bool;

    fn name(&self) -> &'static str;
}

/// Topic names per item kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNames {
    pub posts: String,
    pub comments: String,
}

impl Default for TopicNames {
    fn default() -> Self {
        Self {
            posts: "reddit:posts".to_string(),
            comments: "reddit:comments".to_string(),
        }
    }
}

impl TopicNames {
    pub fn for_kind(&self, kind: ItemKind) -> &str {
        match kind {
            ItemKind::Post => &self.posts,
            ItemKind::Comment => &self.comments,
        }
    }

    pub fn all(&self) -> [&str; 2] {
        [&self.posts, &self.comments]
    }
}

/// Per-topic lengths. Unreadable topics report 0 and are logged.
pub async fn topic_lengths(buffer: &dyn StreamBuffer, topics: &TopicNames) -> Vec<(String, usize)> {
    let mut out = Vec::with_capacity(2);
    for t in topics.all() {
        let n = match buffer.length(t).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(target: "buffer", topic = t, error = %e, "length failed");
                0
            }
        };
        out.push((t.to_string(), n));
    }
    out
}
