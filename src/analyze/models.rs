// src/analyze/models.rs
//! Capability seams for the opaque text models, plus concrete backends.
//!
//! The pipeline only needs two capabilities: "text -> label" and
//! "text -> shorter text". Backends:
//! - `InferenceModel`: remote inference endpoint (`POST {base}/models/{model}`)
//! - `LexiconSentiment` (see `lexicon.rs`): offline sentiment labels
//! - `DisabledModel`: always fails, so callers fall back to their defaults

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::analyze::lexicon::LexiconSentiment;
use crate::config::CapabilityConfig;
use crate::error::CapabilityError;

#[async_trait]
pub trait LabelModel: Send + Sync {
    async fn classify(&self, text: &str) -> Result<String, CapabilityError>;

    /// One label per input, same order. Any failure fails the whole call.
    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, CapabilityError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.classify(t).await?);
        }
        Ok(out)
    }

    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String, CapabilityError>;
    fn name(&self) -> &'static str;
}

/// Models constructed once at startup and shared by reference.
#[derive(Clone)]
pub struct Capabilities {
    pub summary: Arc<dyn SummaryModel>,
    pub emotion: Arc<dyn LabelModel>,
    pub intent: Arc<dyn LabelModel>,
    pub sentiment: Arc<dyn LabelModel>,
}

impl Capabilities {
    /// Everything disabled except the offline sentiment lexicon.
    pub fn offline() -> Self {
        Self {
            summary: Arc::new(DisabledModel::new("summary")),
            emotion: Arc::new(DisabledModel::new("emotion")),
            intent: Arc::new(DisabledModel::new("intent")),
            sentiment: Arc::new(LexiconSentiment::new()),
        }
    }
}

/// Build backends from configuration.
///
/// * No inference token: remote capabilities are disabled (defaults apply).
/// * `sentiment_backend == "remote"` with a token: sentiment uses the remote model,
///   otherwise the offline lexicon.
pub fn build_capabilities(cfg: &CapabilityConfig) -> Result<Capabilities, CapabilityError> {
    let Some(token) = cfg.api_token.as_deref().filter(|t| !t.trim().is_empty()) else {
        tracing::warn!(target: "capabilities", "no inference token configured; emotion/intent/summary use defaults");
        return Ok(Capabilities::offline());
    };

    let http = reqwest::Client::builder()
        .user_agent("reddit-pulse/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| CapabilityError::Request(format!("building http client: {e}")))?;

    let remote = |model: &str| InferenceModel::new(http.clone(), &cfg.base_url, token, model);

    let sentiment: Arc<dyn LabelModel> = if cfg.sentiment_backend.eq_ignore_ascii_case("remote") {
        Arc::new(remote(&cfg.sentiment_model))
    } else {
        Arc::new(LexiconSentiment::new())
    };

    tracing::info!(
        target: "capabilities",
        base = %cfg.base_url,
        emotion = %cfg.emotion_model,
        intent = %cfg.intent_model,
        summary = %cfg.summary_model,
        sentiment = sentiment.name(),
        "inference capabilities ready"
    );

    Ok(Capabilities {
        summary: Arc::new(remote(&cfg.summary_model)),
        emotion: Arc::new(remote(&cfg.emotion_model)),
        intent: Arc::new(remote(&cfg.intent_model)),
        sentiment,
    })
}

// ------------------------------------------------------------
// Disabled backend
// ------------------------------------------------------------

/// Always errors; used when a capability is not configured.
#[derive(Debug, Clone)]
pub struct DisabledModel {
    what: &'static str,
}

impl DisabledModel {
    pub fn new(what: &'static str) -> Self {
        Self { what }
    }
}

#[async_trait]
impl LabelModel for DisabledModel {
    async fn classify(&self, _text: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Disabled(self.what))
    }

    async fn classify_batch(&self, _texts: &[String]) -> Result<Vec<String>, CapabilityError> {
        Err(CapabilityError::Disabled(self.what))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[async_trait]
impl SummaryModel for DisabledModel {
    async fn summarize(&self, _text: &str) -> Result<String, CapabilityError> {
        Err(CapabilityError::Disabled(self.what))
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

// ------------------------------------------------------------
// Remote inference backend
// ------------------------------------------------------------

/// Summary length bounds sent with every summarization request.
const SUMMARY_MAX_TOKENS: u32 = 130;
const SUMMARY_MIN_TOKENS: u32 = 30;

pub struct InferenceModel {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl InferenceModel {
    pub fn new(http: reqwest::Client, base_url: &str, token: &str, model: &str) -> Self {
        Self {
            http,
            url: format!("{}/models/{}", base_url.trim_end_matches('/'), model),
            token: token.to_string(),
        }
    }

    async fn post<B: Serialize + Sync>(&self, body: &B) -> Result<String, CapabilityError> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| CapabilityError::Request(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CapabilityError::Status(status.as_u16()));
        }
        resp.text()
            .await
            .map_err(|e| CapabilityError::Request(e.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ScoredLabel {
    pub label: String,
    #[serde(default)]
    pub score: f32,
}

/// Classification responses come either flat (one input) or nested (one list per input).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LabelResponse {
    Nested(Vec<Vec<ScoredLabel>>),
    Flat(Vec<ScoredLabel>),
}

impl LabelResponse {
    /// Best label per input.
    pub(crate) fn top_labels(self) -> Vec<Option<String>> {
        fn best(v: Vec<ScoredLabel>) -> Option<String> {
            v.into_iter()
                .max_by(|a, b| a.score.total_cmp(&b.score))
                .map(|l| l.label)
        }
        match self {
            LabelResponse::Nested(vv) => vv.into_iter().map(best).collect(),
            LabelResponse::Flat(v) => vec![best(v)],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SummaryOut {
    summary_text: String,
}

#[async_trait]
impl LabelModel for InferenceModel {
    async fn classify(&self, text: &str) -> Result<String, CapabilityError> {
        let body = self.post(&serde_json::json!({ "inputs": text })).await?;
        let parsed: LabelResponse =
            serde_json::from_str(&body).map_err(|e| CapabilityError::Payload(e.to_string()))?;
        parsed
            .top_labels()
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| CapabilityError::Payload("empty label list".into()))
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<String>, CapabilityError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = self.post(&serde_json::json!({ "inputs": texts })).await?;
        let parsed: LabelResponse =
            serde_json::from_str(&body).map_err(|e| CapabilityError::Payload(e.to_string()))?;
        let labels = parsed.top_labels();
        if labels.len() != texts.len() {
            return Err(CapabilityError::Payload(format!(
                "expected {} labels, got {}",
                texts.len(),
                labels.len()
            )));
        }
        labels
            .into_iter()
            .map(|l| l.ok_or_else(|| CapabilityError::Payload("empty label list".into())))
            .collect()
    }

    fn name(&self) -> &'static str {
        "inference"
    }
}

#[async_trait]
impl SummaryModel for InferenceModel {
    async fn summarize(&self, text: &str) -> Result<String, CapabilityError> {
        let req = serde_json::json!({
            "inputs": text,
            "parameters": {
                "max_length": SUMMARY_MAX_TOKENS,
                "min_length": SUMMARY_MIN_TOKENS,
                "do_sample": false
            }
        });
        let body = self.post(&req).await?;
        let parsed: Vec<SummaryOut> =
            serde_json::from_str(&body).map_err(|e| CapabilityError::Payload(e.to_string()))?;
        parsed
            .into_iter()
            .next()
            .map(|s| s.summary_text.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CapabilityError::Payload("empty summary".into()))
    }

    fn name(&self) -> &'static str {
        "inference"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_and_nested_label_payloads_parse() {
        let flat: LabelResponse =
            serde_json::from_str(r#"[{"label":"joy","score":0.9},{"label":"fear","score":0.1}]"#)
                .unwrap();
        assert_eq!(flat.top_labels(), vec![Some("joy".to_string())]);

        let nested: LabelResponse = serde_json::from_str(
            r#"[[{"label":"LABEL_0","score":0.2},{"label":"LABEL_1","score":0.8}],[{"label":"LABEL_0","score":0.7}]]"#,
        )
        .unwrap();
        assert_eq!(
            nested.top_labels(),
            vec![Some("LABEL_1".to_string()), Some("LABEL_0".to_string())]
        );
    }

    #[tokio::test]
    async fn disabled_model_always_fails() {
        let m = DisabledModel::new("emotion");
        assert!(LabelModel::classify(&m, "hello").await.is_err());
        assert!(SummaryModel::summarize(&m, "hello").await.is_err());
    }

    #[test]
    fn missing_token_builds_offline_capabilities() {
        let caps = build_capabilities(&CapabilityConfig::default()).unwrap();
        assert_eq!(caps.sentiment.name(), "lexicon-sentiment");
        assert_eq!(caps.emotion.name(), "disabled");
    }
}
