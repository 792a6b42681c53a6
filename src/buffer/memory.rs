// src/buffer/memory.rs
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::{MessageId, StreamBuffer, StreamMessage};
use crate::error::BufferResult;
use crate::ingest::types::ContentItem;

#[derive(Debug, Default)]
struct Topic {
    last_id: u64,
    messages: Vec<StreamMessage>,
}

/// Process-local buffer. Same semantics as the file buffer, minus durability.
#[derive(Debug, Default)]
pub struct MemoryBuffer {
    topics: Mutex<HashMap<String, Topic>>,
    appended: Notify,
}

impl MemoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn collect(&self, topic: &str, cursor: MessageId, max_count: usize) -> Vec<StreamMessage> {
        let g = self.topics.lock();
        match g.get(topic) {
            Some(t) => t
                .messages
                .iter()
                .filter(|m| m.id >= cursor)
                .take(max_count)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl StreamBuffer for MemoryBuffer {
    async fn append(&self, topic: &str, payload: &ContentItem) -> BufferResult<MessageId> {
        let id = {
            let mut g = self.topics.lock();
            let t = g.entry(topic.to_string()).or_default();
            t.last_id += 1;
            let id = MessageId(t.last_id);
            t.messages.push(StreamMessage {
                id,
                produced_at: Utc::now(),
                payload: payload.clone(),
            });
            id
        };
        self.appended.notify_waiters();
        Ok(id)
    }

    async fn read(
        &self,
        topic: &str,
        cursor: MessageId,
        max_count: usize,
        block: Duration,
    ) -> BufferResult<Vec<StreamMessage>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let deadline = Instant::now() + block;
        loop {
            // Register interest before looking, so an append in between is not missed.
            let notified = self.appended.notified();
            let msgs = self.collect(topic, cursor, max_count);
            let now = Instant::now();
            if !msgs.is_empty() || now >= deadline {
                return Ok(msgs);
            }
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return Ok(self.collect(topic, cursor, max_count));
            }
        }
    }

    async fn length(&self, topic: &str) -> BufferResult<usize> {
        Ok(self
            .topics
            .lock()
            .get(topic)
            .map(|t| t.messages.len())
            .unwrap_or(0))
    }

    async fn clear(&self, topic: &str) -> BufferResult<()> {
        if let Some(t) = self.topics.lock().get_mut(topic) {
            t.messages.clear();
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
