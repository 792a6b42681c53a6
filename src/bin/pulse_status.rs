//! Prints store statistics and buffer topic lengths.
//! With `--follow`, keeps printing newly stored items as they arrive.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use reddit_pulse::buffer::{topic_lengths, FileBuffer};
use reddit_pulse::config::AppConfig;
use reddit_pulse::store::{store_stats, DocumentStore, LiveFeed, SqliteStore};

const FOLLOW_POLL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let cfg = AppConfig::from_env().context("loading configuration")?;
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&cfg.store_path)
            .with_context(|| format!("opening store at {}", cfg.store_path))?,
    );

    let stats = store_stats(store.as_ref(), Utc::now()).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    if let Some(dir) = &cfg.buffer_dir {
        let buffer = FileBuffer::open(dir).await?;
        for (topic, len) in topic_lengths(&buffer, &cfg.topics).await {
            println!("{topic}: {len} buffered");
        }
    }

    if !std::env::args().any(|a| a == "--follow") {
        return Ok(());
    }

    let mut feed = LiveFeed::new(store, Utc::now());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(FOLLOW_POLL) => {}
        }
        for doc in feed.poll(100).await? {
            println!(
                "{} r/{} {} emotion={} intent={} sarcasm={}",
                doc.item.kind(),
                doc.item.subreddit(),
                doc.item.id(),
                doc.emotion.as_deref().unwrap_or("-"),
                doc.intent.as_deref().unwrap_or("-"),
                doc.sarcasm.map(|s| s.to_string()).as_deref().unwrap_or("-"),
            );
        }
    }
    Ok(())
}
