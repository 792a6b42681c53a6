// src/buffer/file.rs
//! Durable buffer: one JSON-lines file per topic inside a directory.
//!
//! Each line is a serialized `StreamMessage`. The last id per topic is
//! recovered on first use from the log tail and from a small `.seq` file that
//! survives `clear`, so ids never go backwards across restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{MessageId, StreamBuffer, StreamMessage};
use crate::error::{BufferError, BufferResult};
use crate::ingest::types::ContentItem;

pub struct FileBuffer {
    dir: PathBuf,
    // topic -> last assigned id; also serializes appends
    last_ids: Mutex<HashMap<String, u64>>,
    appended: Notify,
}

impl FileBuffer {
    /// Opens (and creates if needed) the buffer directory.
    pub async fn open(dir: impl Into<PathBuf>) -> BufferResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            last_ids: Mutex::new(HashMap::new()),
            appended: Notify::new(),
        })
    }

    fn log_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", file_stem(topic)))
    }

    fn seq_path(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{}.seq", file_stem(topic)))
    }

    async fn load_messages(&self, topic: &str) -> BufferResult<Vec<StreamMessage>> {
        let content = match fs::read_to_string(self.log_path(topic)).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut out = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamMessage>(line) {
                Ok(m) => out.push(m),
                // A torn final line after a crash is skipped, not fatal.
                Err(e) => tracing::warn!(target: "buffer", topic, line = n + 1, error = %e, "skipping unreadable message"),
            }
        }
        Ok(out)
    }

    async fn recover_last_id(&self, topic: &str) -> BufferResult<u64> {
        let from_log = self
            .load_messages(topic)
            .await?
            .last()
            .map(|m| m.id.0)
            .unwrap_or(0);
        let from_seq = match fs::read_to_string(self.seq_path(topic)).await {
            Ok(s) => s.trim().parse::<u64>().unwrap_or(0),
            Err(_) => 0,
        };
        Ok(from_log.max(from_seq))
    }

    async fn collect(
        &self,
        topic: &str,
        cursor: MessageId,
        max_count: usize,
    ) -> BufferResult<Vec<StreamMessage>> {
        Ok(self
            .load_messages(topic)
            .await?
            .into_iter()
            .filter(|m| m.id >= cursor)
            .take(max_count)
            .collect())
    }
}

/// Topic names like `reddit:posts` become safe file stems (`reddit_posts`).
fn file_stem(topic: &str) -> String {
    topic
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl StreamBuffer for FileBuffer {
    async fn append(&self, topic: &str, payload: &ContentItem) -> BufferResult<MessageId> {
        let mut ids = self.last_ids.lock().await;
        let last = match ids.get(topic) {
            Some(v) => *v,
            None => self.recover_last_id(topic).await?,
        };
        let id = MessageId(last + 1);
        // Reserved before writing: a line that reached disk before a later step
        // failed must never have its id handed out again.
        ids.insert(topic.to_string(), id.0);
        let msg = StreamMessage {
            id,
            produced_at: Utc::now(),
            payload: payload.clone(),
        };
        let mut line = serde_json::to_string(&msg)?;
        line.push('\n');

        let mut f = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(topic))
            .await?;
        f.write_all(line.as_bytes()).await?;
        f.sync_data().await?;
        drop(ids);
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
            let notified = self.appended.notified();
            let msgs = self.collect(topic, cursor, max_count).await?;
            let now = Instant::now();
            if !msgs.is_empty() || now >= deadline {
                return Ok(msgs);
            }
            // Writers in other processes do not notify; the final read at the deadline sees them.
            if tokio::time::timeout(deadline - now, notified).await.is_err() {
                return self.collect(topic, cursor, max_count).await;
            }
        }
    }

    async fn length(&self, topic: &str) -> BufferResult<usize> {
        Ok(self.load_messages(topic).await?.len())
    }

    async fn clear(&self, topic: &str) -> BufferResult<()> {
        let mut ids = self.last_ids.lock().await;
        let last = match ids.get(topic) {
            Some(v) => *v,
            None => self.recover_last_id(topic).await?,
        };
        fs::write(self.seq_path(topic), last.to_string()).await?;
        match fs::remove_file(self.log_path(topic)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(BufferError::Io(e)),
        }
        ids.insert(topic.to_string(), last);
        tracing::info!(target: "buffer", topic, "cleared topic");
        Ok(())
    }

    async fn health(&self) -> bool {
        match fs::metadata(&self.dir).await {
            Ok(m) => m.is_dir() && !m.permissions().readonly(),
            Err(e) => {
                tracing::warn!(target: "buffer", dir = %self.dir.display(), error = %e, "health check failed");
                false
            }
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::{Comment, ContentItem};

    fn comment(id: &str) -> ContentItem {
        ContentItem::Comment(Comment {
            id: id.into(),
            subreddit: "rust".into(),
            author: Some("bob".into()),
            body: "hello there".into(),
            created_utc: Utc::now(),
            score: 1,
            post_id: "p1".into(),
            parent_id: "t3_p1".into(),
            fetched_at: Utc::now(),
        })
    }

    #[test]
    fn topic_names_map_to_safe_stems() {
        assert_eq!(file_stem("reddit:posts"), "reddit_posts");
        assert_eq!(file_stem("a/b c"), "a_b_c");
    }

    #[tokio::test]
    async fn ids_survive_reopen_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        {
            let b = FileBuffer::open(dir.path()).await.unwrap();
            b.append("reddit:comments", &comment("1")).await.unwrap();
            b.append("reddit:comments", &comment("2")).await.unwrap();
        }
        let b = FileBuffer::open(dir.path()).await.unwrap();
        assert_eq!(b.length("reddit:comments").await.unwrap(), 2);
        assert_eq!(
            b.append("reddit:comments", &comment("3")).await.unwrap(),
            MessageId(3)
        );

        b.clear("reddit:comments").await.unwrap();
        assert_eq!(b.length("reddit:comments").await.unwrap(), 0);

        let reopened = FileBuffer::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened
                .append("reddit:comments", &comment("4"))
                .await
                .unwrap(),
            MessageId(4)
        );
    }

    #[tokio::test]
    async fn failed_append_never_reuses_its_id() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBuffer::open(dir.path()).await.unwrap();
        assert_eq!(b.append("t", &comment("1")).await.unwrap(), MessageId(1));

        // swap the log for a directory so the next write fails after the id was taken
        let log = dir.path().join("t.jsonl");
        std::fs::remove_file(&log).unwrap();
        std::fs::create_dir(&log).unwrap();
        assert!(b.append("t", &comment("2")).await.is_err());

        std::fs::remove_dir(&log).unwrap();
        assert_eq!(b.append("t", &comment("3")).await.unwrap(), MessageId(3));
        let msgs = b.read("t", MessageId::START, 10, Duration::ZERO).await.unwrap();
        let ids: Vec<u64> = msgs.iter().map(|m| m.id.0).collect();
        assert_eq!(ids, vec![3]);
    }

    #[tokio::test]
    async fn health_reflects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBuffer::open(dir.path().join("buf")).await.unwrap();
        assert!(b.health().await);
        std::fs::remove_dir_all(dir.path().join("buf")).unwrap();
        assert!(!b.health().await);
    }
}
