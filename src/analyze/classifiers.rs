// src/analyze/classifiers.rs
//! Emotion, intent and sarcasm-proxy classifiers.
//!
//! All three summarize their input through the shared `TextSummarizer`, map
//! the model's raw label into a fixed taxonomy, and substitute a default
//! label whenever the model fails, the text is empty, or the label is unknown.
//!
//! Batch classification runs fixed-size batches one after another. A failed
//! batch call defaults every item of that batch and the next batch proceeds.

use std::sync::Arc;

use metrics::counter;

use crate::analyze::models::{Capabilities, LabelModel};
use crate::analyze::summarizer::TextSummarizer;
use crate::ingest::types::{ContentItem, EnrichedItem};

pub const DEFAULT_BATCH_SIZE: usize = 32;

pub const EMOTION_LABELS: [&str; 7] = [
    "anger", "disgust", "fear", "joy", "neutral", "sadness", "surprise",
];
pub const EMOTION_DEFAULT: &str = "neutral";
pub const INTENT_DEFAULT: &str = "ham";
/// Sentiment label the sarcasm proxy treats as sarcastic.
pub const SARCASM_SENTIMENT: &str = "negative";
const SENTIMENT_DEFAULT: &str = "neutral";

/// Maps a raw model label into the taxonomy, `None` when it does not fit.
type Normalize = fn(&str) -> Option<&'static str>;

/// Shared machinery behind the three public classifiers.
struct Labeler {
    kind: &'static str,
    model: Arc<dyn LabelModel>,
    summarizer: Arc<TextSummarizer>,
    default: &'static str,
    normalize: Normalize,
}

impl Labeler {
    fn fallback(&self, why: &str) -> String {
        counter!("classifier_fallback_total", "classifier" => self.kind).increment(1);
        tracing::debug!(target: "classifier", classifier = self.kind, why, "using default label");
        self.default.to_string()
    }

    fn map_label(&self, raw: &str) -> String {
        match (self.normalize)(raw) {
            Some(l) => l.to_string(),
            None => self.fallback("label outside taxonomy"),
        }
    }

    async fn label(&self, text: &str) -> String {
        if text.trim().is_empty() {
            return self.default.to_string();
        }
        let input = self.summarizer.summarize(text).await;
        match self.model.classify(&input).await {
            Ok(raw) => self.map_label(&raw),
            Err(e) => {
                tracing::warn!(target: "classifier", classifier = self.kind, model = self.model.name(), error = %e, "classification failed");
                self.fallback("model error")
            }
        }
    }

    async fn label_batch(&self, texts: &[String], batch_size: usize) -> Vec<String> {
        let batch_size = batch_size.max(1);
        let mut out = Vec::with_capacity(texts.len());

        for (batch_no, batch) in texts.chunks(batch_size).enumerate() {
            // Empty texts never reach the model; remember where they sit.
            let mut inputs = Vec::with_capacity(batch.len());
            let mut slots: Vec<Option<usize>> = Vec::with_capacity(batch.len());
            for t in batch {
                if t.trim().is_empty() {
                    slots.push(None);
                } else {
                    slots.push(Some(inputs.len()));
                    inputs.push(self.summarizer.summarize(t).await);
                }
            }

            let labels = if inputs.is_empty() {
                Ok(Vec::new())
            } else {
                self.model.classify_batch(&inputs).await
            };

            match labels {
                Ok(labels) if labels.len() == inputs.len() => {
                    for slot in slots {
                        out.push(match slot {
                            Some(i) => self.map_label(&labels[i]),
                            None => self.default.to_string(),
                        });
                    }
                }
                Ok(labels) => {
                    tracing::warn!(target: "classifier", classifier = self.kind, batch = batch_no, expected = inputs.len(), got = labels.len(), "batch size mismatch, defaulting batch");
                    counter!("classifier_batch_fallback_total", "classifier" => self.kind).increment(1);
                    out.extend(std::iter::repeat(self.default.to_string()).take(batch.len()));
                }
                Err(e) => {
                    tracing::warn!(target: "classifier", classifier = self.kind, batch = batch_no, size = batch.len(), error = %e, "batch classification failed, defaulting batch");
                    counter!("classifier_batch_fallback_total", "classifier" => self.kind).increment(1);
                    out.extend(std::iter::repeat(self.default.to_string()).take(batch.len()));
                }
            }
        }
        out
    }
}

fn normalize_emotion(raw: &str) -> Option<&'static str> {
    let l = raw.trim().to_ascii_lowercase();
    EMOTION_LABELS.iter().copied().find(|e| *e == l)
}

fn normalize_intent(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "ham" | "label_0" => Some("ham"),
        "spam" | "label_1" => Some("spam"),
        _ => None,
    }
}

fn normalize_sentiment(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "negative" => Some("negative"),
        "neutral" => Some("neutral"),
        "positive" => Some("positive"),
        _ => None,
    }
}

pub struct EmotionClassifier(Labeler);

impl EmotionClassifier {
    pub fn new(model: Arc<dyn LabelModel>, summarizer: Arc<TextSummarizer>) -> Self {
        Self(Labeler {
            kind: "emotion",
            model,
            summarizer,
            default: EMOTION_DEFAULT,
            normalize: normalize_emotion,
        })
    }

    pub async fn classify(&self, text: &str) -> String {
        self.0.label(text).await
    }

    pub async fn classify_batch(&self, texts: &[String], batch_size: usize) -> Vec<String> {
        self.0.label_batch(texts, batch_size).await
    }
}

pub struct IntentClassifier(Labeler);

impl IntentClassifier {
    pub fn new(model: Arc<dyn LabelModel>, summarizer: Arc<TextSummarizer>) -> Self {
        Self(Labeler {
            kind: "intent",
            model,
            summarizer,
            default: INTENT_DEFAULT,
            normalize: normalize_intent,
        })
    }

    pub async fn classify(&self, text: &str) -> String {
        self.0.label(text).await
    }

    pub async fn classify_batch(&self, texts: &[String], batch_size: usize) -> Vec<String> {
        self.0.label_batch(texts, batch_size).await
    }
}

/// Sarcastic means "the sentiment model says negative".
pub struct SarcasmProxyClassifier(Labeler);

impl SarcasmProxyClassifier {
    pub fn new(sentiment: Arc<dyn LabelModel>, summarizer: Arc<TextSummarizer>) -> Self {
        Self(Labeler {
            kind: "sarcasm",
            model: sentiment,
            summarizer,
            default: SENTIMENT_DEFAULT,
            normalize: normalize_sentiment,
        })
    }

    pub async fn classify(&self, text: &str) -> bool {
        self.0.label(text).await == SARCASM_SENTIMENT
    }

    pub async fn classify_batch(&self, texts: &[String], batch_size: usize) -> Vec<bool> {
        self.0
            .label_batch(texts, batch_size)
            .await
            .into_iter()
            .map(|l| l == SARCASM_SENTIMENT)
            .collect()
    }
}

/// The three classifiers, built once and shared by the orchestrator.
pub struct Enricher {
    pub emotion: EmotionClassifier,
    pub intent: IntentClassifier,
    pub sarcasm: SarcasmProxyClassifier,
}

impl Enricher {
    pub fn new(caps: &Capabilities) -> Self {
        let summarizer = Arc::new(TextSummarizer::new(caps.summary.clone()));
        Self::with_summarizer(caps, summarizer)
    }

    pub fn with_summarizer(caps: &Capabilities, summarizer: Arc<TextSummarizer>) -> Self {
        Self {
            emotion: EmotionClassifier::new(caps.emotion.clone(), summarizer.clone()),
            intent: IntentClassifier::new(caps.intent.clone(), summarizer.clone()),
            sarcasm: SarcasmProxyClassifier::new(caps.sentiment.clone(), summarizer),
        }
    }

    /// Labels are recomputed from scratch each time an item comes through.
    pub async fn enrich(&self, item: ContentItem, text: &str) -> EnrichedItem {
        let emotion = self.emotion.classify(text).await;
        let intent = self.intent.classify(text).await;
        let sarcasm = self.sarcasm.classify(text).await;
        EnrichedItem {
            item,
            emotion: Some(emotion),
            intent: Some(intent),
            sarcasm: Some(sarcasm),
        }
    }
}
