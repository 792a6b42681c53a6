//! reddit-pulse ingestion daemon entrypoint.
//! Loads configuration, wires the pipeline and runs cycles on a fixed interval
//! until Ctrl-C. `--once` runs a single cycle and prints its stats as JSON.

use std::sync::Arc;

use anyhow::Context;
use reddit_pulse::config::{load_sources_default, AppConfig};
use reddit_pulse::ingest::{ContentSource, RedditClient};
use reddit_pulse::{build_orchestrator, metrics, PipelineJob, Scheduler};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reddit_pulse=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the file is absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Missing credentials or store path stop us before any ingestion.
    let cfg = AppConfig::from_env().context("loading configuration")?;

    if let Some(addr) = cfg.metrics_addr {
        metrics::install_exporter(addr)?;
    } else {
        metrics::ensure_metrics_described();
    }

    let sources = load_sources_default().context("loading sources")?;
    let client: Arc<dyn ContentSource> =
        Arc::new(RedditClient::new(cfg.reddit.clone()).context("building reddit client")?);
    let orchestrator = Arc::new(build_orchestrator(&cfg).await?);

    tracing::info!(
        sources = sources.len(),
        post_limit = cfg.post_limit,
        comment_limit = cfg.comment_limit,
        interval_secs = cfg.cycle_interval.as_secs(),
        "pipeline ready"
    );

    if std::env::args().any(|a| a == "--once") {
        let stats = orchestrator.run_cycle(&sources, client.as_ref()).await;
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let job = Arc::new(PipelineJob::new(orchestrator, client, sources));
    let handle = Scheduler::new(job, cfg.cycle_interval).spawn();

    tokio::signal::ctrl_c()
        .await
        .context("waiting for ctrl-c")?;
    tracing::info!("shutdown requested, finishing current cycle");
    handle.stop().await;
    Ok(())
}
