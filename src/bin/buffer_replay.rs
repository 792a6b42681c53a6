//! Re-processes buffered items into the store (filter -> enrich -> upsert).
//!
//! Usage: `buffer_replay [posts|comments|<topic>] [max_count]`
//! Defaults to both topics, 100 messages each. Safe to run repeatedly.

use anyhow::{bail, Context};
use reddit_pulse::build_orchestrator;
use reddit_pulse::config::AppConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reddit_pulse=info,warn")))
        .with(fmt::layer().compact())
        .init();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    if cfg.buffer_dir.is_none() {
        bail!("BUFFER_DIR is not set; nothing to replay");
    }

    let mut args = std::env::args().skip(1);
    let which = args.next();
    let max_count: usize = match args.next() {
        Some(n) => n.parse().with_context(|| format!("invalid max_count `{n}`"))?,
        None => 100,
    };

    let topics: Vec<String> = match which.as_deref() {
        None | Some("all") => cfg.topics.all().iter().map(|t| t.to_string()).collect(),
        Some("posts") => vec![cfg.topics.posts.clone()],
        Some("comments") => vec![cfg.topics.comments.clone()],
        Some(other) => vec![other.to_string()],
    };

    let orchestrator = build_orchestrator(&cfg).await?;
    for topic in topics {
        let stats = orchestrator
            .replay(&topic, max_count)
            .await
            .with_context(|| format!("replaying {topic}"))?;
        println!(
            "{topic}: processed={} stored={} updated={} filtered={} failures={}",
            stats.processed(),
            stats.stored(),
            stats.updated(),
            stats.filtered(),
            stats.storage_failures
        );
    }
    Ok(())
}
