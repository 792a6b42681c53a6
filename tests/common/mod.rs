// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use reddit_pulse::analyze::{Capabilities, Enricher, LabelModel, SummaryModel};
use reddit_pulse::buffer::{MessageId, StreamBuffer, StreamMessage};
use reddit_pulse::error::{
    BufferError, BufferResult, CapabilityError, SourceError, StoreError, StoreResult,
};
use reddit_pulse::ingest::{Comment, ContentItem, ContentSource, EnrichedItem, ItemKey, Post};
use reddit_pulse::store::{DocFilter, DocumentStore, FindQuery, UpsertOutcome};

// ---------- fixtures ----------

pub fn post(id: &str, subreddit: &str, author: Option<&str>, title: &str, body: &str) -> Post {
    Post {
        id: id.into(),
        subreddit: subreddit.into(),
        author: author.map(Into::into),
        title: title.into(),
        body: body.into(),
        created_utc: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        score: 10,
        url: format!("https://www.reddit.com/r/{subreddit}/comments/{id}/"),
        num_comments: 1,
        fetched_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 5, 0).unwrap(),
    }
}

pub fn comment(id: &str, subreddit: &str, author: Option<&str>, body: &str, post_id: &str) -> Comment {
    Comment {
        id: id.into(),
        subreddit: subreddit.into(),
        author: author.map(Into::into),
        body: body.into(),
        created_utc: Utc.with_ymd_and_hms(2025, 3, 1, 12, 1, 0).unwrap(),
        score: 3,
        post_id: post_id.into(),
        parent_id: format!("t3_{post_id}"),
        fetched_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 5, 0).unwrap(),
    }
}

// ---------- content source ----------

/// Scripted source. Unknown sources return empty listings.
#[derive(Default)]
pub struct MockSource {
    posts: HashMap<String, Vec<Post>>,
    comments: HashMap<String, Vec<Comment>>,
    failing: HashSet<String>,
    pub calls: Mutex<Vec<String>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_posts(mut self, source: &str, posts: Vec<Post>) -> Self {
        self.posts.insert(source.into(), posts);
        self
    }

    pub fn with_comments(mut self, source: &str, comments: Vec<Comment>) -> Self {
        self.comments.insert(source.into(), comments);
        self
    }

    /// Every call for `source` fails.
    pub fn failing(mut self, source: &str) -> Self {
        self.failing.insert(source.into());
        self
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn new_posts(&self, source: &str, limit: usize) -> Result<Vec<Post>, SourceError> {
        self.calls.lock().push(format!("posts:{source}"));
        if self.failing.contains(source) {
            return Err(SourceError::Http {
                source_name: source.into(),
                message: "connection reset".into(),
            });
        }
        Ok(self
            .posts
            .get(source)
            .map(|v| v.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn new_comments(&self, source: &str, limit: usize) -> Result<Vec<Comment>, SourceError> {
        self.calls.lock().push(format!("comments:{source}"));
        if self.failing.contains(source) {
            return Err(SourceError::Status {
                source_name: source.into(),
                status: 503,
            });
        }
        Ok(self
            .comments
            .get(source)
            .map(|v| v.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ---------- capabilities ----------

/// Returns the same raw label for every input and records what it saw.
pub struct FixedLabel {
    label: String,
    pub seen: Mutex<Vec<String>>,
}

impl FixedLabel {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LabelModel for FixedLabel {
    async fn classify(&self, text: &str) -> Result<String, CapabilityError> {
        self.seen.lock().push(text.to_string());
        Ok(self.label.clone())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}

pub struct FailingLabel;

#[async_trait]
impl LabelModel for FailingLabel {
    async fn classify(&self, _text: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Status(503))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Batch calls succeed with `label` except the batch numbered `fail_batch` (0-based).
pub struct FailNthBatch {
    label: String,
    fail_batch: usize,
    pub batch_calls: AtomicUsize,
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl FailNthBatch {
    pub fn new(label: &str, fail_batch: usize) -> Arc<Self> {
        Arc::new(Self {
            label: label.into(),
            fail_batch,
            batch_calls: AtomicUsize::new(0),
            batch_sizes: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LabelModel for FailNthBatch {
    async fn classify(&self, _text: &str) -> Result<String, CapabilityError> {
        Ok(self.label.clone())
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, CapabilityError> {
        let n = self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.batch_sizes.lock().push(texts.len());
        if n == self.fail_batch {
            return Err(CapabilityError::Request("batch timed out".into()));
        }
        Ok(vec![self.label.clone(); texts.len()])
    }

    fn name(&self) -> &'static str {
        "fail-nth-batch"
    }
}

/// Summarizes to `[<n chars>]` and records every input it was given.
#[derive(Default)]
pub struct RecordingSummary {
    pub inputs: Mutex<Vec<String>>,
}

impl RecordingSummary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl SummaryModel for RecordingSummary {
    async fn summarize(&self, text: &str) -> Result<String, CapabilityError> {
        self.inputs.lock().push(text.to_string());
        Ok(format!("[{}]", text.chars().count()))
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

pub struct FailingSummary;

#[async_trait]
impl SummaryModel for FailingSummary {
    async fn summarize(&self, _text: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Request("model loading".into()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

pub struct TestCaps {
    pub emotion: Arc<FixedLabel>,
    pub intent: Arc<FixedLabel>,
    pub sentiment: Arc<FixedLabel>,
    pub summary: Arc<RecordingSummary>,
}

impl TestCaps {
    pub fn new() -> Self {
        Self {
            emotion: FixedLabel::new("joy"),
            intent: FixedLabel::new("LABEL_0"),
            sentiment: FixedLabel::new("negative"),
            summary: RecordingSummary::new(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            summary: self.summary.clone(),
            emotion: self.emotion.clone(),
            intent: self.intent.clone(),
            sentiment: self.sentiment.clone(),
        }
    }

    pub fn enricher(&self) -> Arc<Enricher> {
        Arc::new(Enricher::new(&self.capabilities()))
    }
}

// ---------- buffer / store doubles ----------

/// A buffer whose backend is gone: probe fails, every call errors.
pub struct DownBuffer;

#[async_trait]
impl StreamBuffer for DownBuffer {
    async fn append(&self, _topic: &str, _payload: &ContentItem) -> BufferResult<MessageId> {
        Err(BufferError::Unavailable("connection refused".into()))
    }

    async fn read(
        &self,
        _topic: &str,
        _cursor: MessageId,
        _max_count: usize,
        _block: Duration,
    ) -> BufferResult<Vec<StreamMessage>> {
        Err(BufferError::Unavailable("connection refused".into()))
    }

    async fn length(&self, _topic: &str) -> BufferResult<usize> {
        Err(BufferError::Unavailable("connection refused".into()))
    }

    async fn clear(&self, _topic: &str) -> BufferResult<()> {
        Err(BufferError::Unavailable("connection refused".into()))
    }

    async fn health(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

/// Passes through to an inner store but rejects writes for one id.
pub struct RejectingStore {
    pub inner: Arc<dyn DocumentStore>,
    pub reject_id: String,
}

#[async_trait]
impl DocumentStore for RejectingStore {
    async fn upsert(&self, key: &ItemKey, doc: &EnrichedItem) -> StoreResult<UpsertOutcome> {
        if key.id == self.reject_id {
            return Err(StoreError::Backend("disk full".into()));
        }
        self.inner.upsert(key, doc).await
    }

    async fn get(&self, key: &ItemKey) -> StoreResult<Option<EnrichedItem>> {
        self.inner.get(key).await
    }

    async fn count(&self, filter: &DocFilter) -> StoreResult<u64> {
        self.inner.count(filter).await
    }

    async fn find(&self, query: &FindQuery) -> StoreResult<Vec<EnrichedItem>> {
        self.inner.find(query).await
    }

    fn name(&self) -> &'static str {
        "rejecting"
    }
}
