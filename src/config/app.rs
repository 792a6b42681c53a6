// src/config/app.rs
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::buffer::TopicNames;
use crate::error::ConfigError;
use crate::ingest::reddit::RedditCredentials;

pub const DEFAULT_USER_AGENT: &str = "reddit-pulse/0.1";
pub const DEFAULT_POST_LIMIT: usize = 10;
pub const DEFAULT_COMMENT_LIMIT: usize = 20;
pub const DEFAULT_CYCLE_INTERVAL_SECS: u64 = 300;

/// Settings for the text models behind the classifiers and summarizer.
#[derive(Debug, Clone)]
pub struct CapabilityConfig {
    /// Unset token means every remote capability is disabled.
    pub api_token: Option<String>,
    pub base_url: String,
    pub emotion_model: String,
    pub intent_model: String,
    pub sentiment_model: String,
    pub summary_model: String,
    /// "lexicon" (offline) or "remote".
    pub sentiment_backend: String,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: "https://api-inference.huggingface.co".into(),
            emotion_model: "j-hartmann/emotion-english-distilroberta-base".into(),
            intent_model: "mrm8488/bert-tiny-finetuned-sms-spam-detection".into(),
            sentiment_model: "cardiffnlp/twitter-roberta-base-sentiment-latest".into(),
            summary_model: "sshleifer/distilbart-cnn-12-6".into(),
            sentiment_backend: "lexicon".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub reddit: RedditCredentials,
    pub store_path: String,
    pub buffer_dir: Option<PathBuf>,
    pub topics: TopicNames,
    pub post_limit: usize,
    pub comment_limit: usize,
    pub cycle_interval: Duration,
    pub capabilities: CapabilityConfig,
    pub metrics_addr: Option<SocketAddr>,
}

impl AppConfig {
    /// Read from the process environment. Call `dotenvy::dotenv()` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Same as `from_env`, reading values through `get`.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let opt = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let client_id = required(&opt, "REDDIT_CLIENT_ID")?;
        let client_secret = required(&opt, "REDDIT_CLIENT_SECRET")?;
        let store_path = required(&opt, "STORE_PATH")?;

        let defaults = CapabilityConfig::default();
        let capabilities = CapabilityConfig {
            api_token: opt("INFERENCE_API_TOKEN"),
            base_url: opt("INFERENCE_BASE_URL").unwrap_or(defaults.base_url),
            emotion_model: opt("EMOTION_MODEL").unwrap_or(defaults.emotion_model),
            intent_model: opt("INTENT_MODEL").unwrap_or(defaults.intent_model),
            sentiment_model: opt("SENTIMENT_MODEL").unwrap_or(defaults.sentiment_model),
            summary_model: opt("SUMMARY_MODEL").unwrap_or(defaults.summary_model),
            sentiment_backend: match opt("SENTIMENT_BACKEND") {
                None => defaults.sentiment_backend,
                Some(b) => match b.to_ascii_lowercase().as_str() {
                    "lexicon" | "remote" => b.to_ascii_lowercase(),
                    _ => {
                        return Err(ConfigError::Invalid {
                            key: "SENTIMENT_BACKEND",
                            reason: format!("expected `lexicon` or `remote`, got `{b}`"),
                        })
                    }
                },
            },
        };

        let topic_defaults = TopicNames::default();
        let metrics_addr = match opt("METRICS_ADDR") {
            None => None,
            Some(a) => Some(a.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: "METRICS_ADDR",
                reason: e.to_string(),
            })?),
        };

        Ok(Self {
            reddit: RedditCredentials {
                client_id,
                client_secret,
                user_agent: opt("REDDIT_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.into()),
            },
            store_path,
            buffer_dir: opt("BUFFER_DIR").map(PathBuf::from),
            topics: TopicNames {
                posts: opt("BUFFER_POSTS_TOPIC").unwrap_or(topic_defaults.posts),
                comments: opt("BUFFER_COMMENTS_TOPIC").unwrap_or(topic_defaults.comments),
            },
            post_limit: parse_or(&opt, "POST_LIMIT", DEFAULT_POST_LIMIT)?,
            comment_limit: parse_or(&opt, "COMMENT_LIMIT", DEFAULT_COMMENT_LIMIT)?,
            cycle_interval: Duration::from_secs(parse_or(
                &opt,
                "CYCLE_INTERVAL_SECS",
                DEFAULT_CYCLE_INTERVAL_SECS,
            )?),
            capabilities,
            metrics_addr,
        })
    }
}

/// Placeholder values copied from a template `.env` are treated as missing.
fn required<F>(opt: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match opt(key) {
        Some(v) if !v.starts_with("your_") => Ok(v),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_or<F, T>(opt: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match opt(key) {
        None => Ok(default),
        Some(v) => v.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: format!("`{v}`: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("REDDIT_CLIENT_ID", "id"),
        ("REDDIT_CLIENT_SECRET", "secret"),
        ("STORE_PATH", ":memory:"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = AppConfig::from_lookup(lookup(&BASE)).unwrap();
        assert_eq!(cfg.post_limit, 10);
        assert_eq!(cfg.comment_limit, 20);
        assert_eq!(cfg.cycle_interval, Duration::from_secs(300));
        assert_eq!(cfg.topics.posts, "reddit:posts");
        assert_eq!(cfg.reddit.user_agent, DEFAULT_USER_AGENT);
        assert!(cfg.buffer_dir.is_none());
        assert!(cfg.capabilities.api_token.is_none());
        assert_eq!(cfg.capabilities.sentiment_backend, "lexicon");
    }

    #[test]
    fn missing_or_placeholder_credentials_are_fatal() {
        let err = AppConfig::from_lookup(lookup(&[("STORE_PATH", "x.db")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REDDIT_CLIENT_ID")));

        let err = AppConfig::from_lookup(lookup(&[
            ("REDDIT_CLIENT_ID", "your_client_id"),
            ("REDDIT_CLIENT_SECRET", "s"),
            ("STORE_PATH", "x.db"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REDDIT_CLIENT_ID")));

        let err = AppConfig::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("STORE_PATH")));
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut pairs = BASE.to_vec();
        pairs.push(("POST_LIMIT", "ten"));
        let err = AppConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POST_LIMIT", .. }));
    }
}
