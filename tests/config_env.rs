// tests/config_env.rs
use std::env;

use reddit_pulse::config::AppConfig;
use reddit_pulse::error::ConfigError;
use serial_test::serial;

const KEYS: &[&str] = &[
    "REDDIT_CLIENT_ID",
    "REDDIT_CLIENT_SECRET",
    "REDDIT_USER_AGENT",
    "STORE_PATH",
    "BUFFER_DIR",
    "POST_LIMIT",
    "COMMENT_LIMIT",
    "CYCLE_INTERVAL_SECS",
    "INFERENCE_API_TOKEN",
    "SENTIMENT_BACKEND",
    "METRICS_ADDR",
];

fn clear_env() {
    for k in KEYS {
        env::remove_var(k);
    }
}

#[test]
#[serial]
fn missing_credentials_fail_before_anything_runs() {
    clear_env();
    env::set_var("STORE_PATH", ":memory:");
    let err = AppConfig::from_env().unwrap_err();
    assert!(matches!(err, ConfigError::Missing("REDDIT_CLIENT_ID")));
    clear_env();
}

#[test]
#[serial]
fn env_overrides_are_applied() {
    clear_env();
    env::set_var("REDDIT_CLIENT_ID", "abc");
    env::set_var("REDDIT_CLIENT_SECRET", "xyz");
    env::set_var("STORE_PATH", "data/test.db");
    env::set_var("BUFFER_DIR", "data/buffer");
    env::set_var("POST_LIMIT", "5");
    env::set_var("CYCLE_INTERVAL_SECS", "60");
    env::set_var("SENTIMENT_BACKEND", "Remote");
    env::set_var("METRICS_ADDR", "127.0.0.1:9000");

    let cfg = AppConfig::from_env().unwrap();
    assert_eq!(cfg.reddit.client_id, "abc");
    assert_eq!(cfg.post_limit, 5);
    assert_eq!(cfg.comment_limit, 20);
    assert_eq!(cfg.cycle_interval.as_secs(), 60);
    assert_eq!(cfg.buffer_dir.as_deref(), Some(std::path::Path::new("data/buffer")));
    assert_eq!(cfg.capabilities.sentiment_backend, "remote");
    assert_eq!(cfg.metrics_addr.unwrap().port(), 9000);

    env::set_var("SENTIMENT_BACKEND", "magic");
    assert!(matches!(
        AppConfig::from_env(),
        Err(ConfigError::Invalid { key: "SENTIMENT_BACKEND", .. })
    ));
    clear_env();
}
