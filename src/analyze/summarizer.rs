// src/analyze/summarizer.rs
//! Bounds text length before classification.
//!
//! Policy, with lengths counted in characters:
//! 1. up to 400 chars: returned unchanged;
//! 2. up to 1000 chars: summarized once;
//! 3. longer: cut into 1000-char chunks, only the first 3 are summarized and
//!    the summaries joined with single spaces. Later chunks are dropped.
//!
//! Any summarizer failure degrades to the first 400 chars plus `...`.

use std::sync::Arc;

use metrics::counter;

use crate::analyze::models::SummaryModel;

pub const PASSTHROUGH_MAX_CHARS: usize = 400;
pub const CHUNK_CHARS: usize = 1000;
pub const MAX_CHUNKS: usize = 3;
pub const TRUNCATION_MARKER: &str = "...";

/// One instance is shared by every classifier.
pub struct TextSummarizer {
    model: Arc<dyn SummaryModel>,
}

impl TextSummarizer {
    pub fn new(model: Arc<dyn SummaryModel>) -> Self {
        Self { model }
    }

    /// Never fails; see module docs for the policy.
    pub async fn summarize(&self, text: &str) -> String {
        let len = text.chars().count();
        if len <= PASSTHROUGH_MAX_CHARS {
            return text.to_string();
        }

        let attempt = if len <= CHUNK_CHARS {
            self.model.summarize(text).await
        } else {
            self.summarize_chunks(text).await
        };

        match attempt {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(target: "summarizer", model = self.model.name(), chars = len, error = %e, "summarization failed, truncating");
                counter!("summarizer_fallback_total").increment(1);
                truncate_with_marker(text)
            }
        }
    }

    async fn summarize_chunks(
        &self,
        text: &str,
    ) -> Result<String, crate::error::CapabilityError> {
        let mut parts = Vec::with_capacity(MAX_CHUNKS);
        for chunk in chunks(text, CHUNK_CHARS).into_iter().take(MAX_CHUNKS) {
            parts.push(self.model.summarize(chunk).await?);
        }
        Ok(parts.join(" "))
    }
}

/// Fixed-size character chunks as borrowed slices (char boundaries respected).
pub fn chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut out = Vec::new();
    let mut start = 0usize;
    let mut count = 0usize;
    for (idx, _) in text.char_indices() {
        if count == size {
            out.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// First `PASSTHROUGH_MAX_CHARS` characters followed by `...`.
pub fn truncate_with_marker(text: &str) -> String {
    let mut out: String = text.chars().take(PASSTHROUGH_MAX_CHARS).collect();
    out.push_str(TRUNCATION_MARKER);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_split_on_characters() {
        let s = "ab".repeat(5); // 10 chars
        let c = chunks(&s, 4);
        assert_eq!(c, vec!["abab", "abab", "ab"]);

        let wide = "č".repeat(5);
        let c = chunks(&wide, 2);
        assert_eq!(c.len(), 3);
        assert_eq!(c[2], "č");
    }

    #[test]
    fn truncation_keeps_400_chars_and_marker() {
        let s = "x".repeat(900);
        let t = truncate_with_marker(&s);
        assert_eq!(t.chars().count(), 403);
        assert!(t.ends_with("..."));
    }
}
