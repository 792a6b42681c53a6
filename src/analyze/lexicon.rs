// src/analyze/lexicon.rs
//! Offline sentiment backend: word lexicon with short-range negation.
//! Emits the same labels as the remote sentiment model
//! (`negative` / `neutral` / `positive`).

use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::analyze::models::LabelModel;
use crate::error::CapabilityError;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("../../data/sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Default)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_score(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Returns (score, token count). A negator within the previous 1..=3
    /// tokens flips the sign of a word's score.
    pub fn score_text(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut score: i32 = 0;

        for i in 0..tokens.len() {
            let base = self.word_score(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            score += if negated { -base } else { base };
        }

        (score, tokens.len())
    }

    pub fn label_for(&self, text: &str) -> &'static str {
        match self.score_text(text).0 {
            s if s < 0 => "negative",
            s if s > 0 => "positive",
            _ => "neutral",
        }
    }
}

#[async_trait]
impl LabelModel for LexiconSentiment {
    async fn classify(&self, text: &str) -> Result<String, CapabilityError> {
        Ok(self.label_for(text).to_string())
    }

    fn name(&self) -> &'static str {
        "lexicon-sentiment"
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}
