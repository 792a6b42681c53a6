// src/analyze/mod.rs
//! Enrichment stage: summarizer, capability backends and the three label classifiers.

pub mod classifiers;
pub mod lexicon;
pub mod models;
pub mod summarizer;

// Re-export convenient types.
pub use crate::analyze::classifiers::{
    EmotionClassifier, Enricher, IntentClassifier, SarcasmProxyClassifier, DEFAULT_BATCH_SIZE,
};
pub use crate::analyze::lexicon::LexiconSentiment;
pub use crate::analyze::models::{
    build_capabilities, Capabilities, DisabledModel, InferenceModel, LabelModel, SummaryModel,
};
pub use crate::analyze::summarizer::TextSummarizer;
