// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod analyze;
pub mod buffer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod orchestrator;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::orchestrator::{CycleStats, Orchestrator};
pub use crate::scheduler::{spawn_background_cycle, PipelineJob, Scheduler, StatusBoard};

use std::sync::Arc;

use anyhow::Context;

use crate::analyze::{build_capabilities, Enricher};
use crate::buffer::{FileBuffer, StreamBuffer};
use crate::config::AppConfig;
use crate::ingest::FetchLimits;
use crate::store::{DocumentStore, SqliteStore, StorageSink};

/// Builds the orchestrator from configuration: capabilities, SQLite store
/// and (when `BUFFER_DIR` is set) the file buffer.
pub async fn build_orchestrator(cfg: &AppConfig) -> anyhow::Result<Orchestrator> {
    let caps = build_capabilities(&cfg.capabilities).context("building capabilities")?;
    let enricher = Arc::new(Enricher::new(&caps));

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&cfg.store_path)
            .with_context(|| format!("opening store at {}", cfg.store_path))?,
    );

    let mut orch = Orchestrator::new(enricher, StorageSink::new(store)).with_limits(FetchLimits {
        posts: cfg.post_limit,
        comments: cfg.comment_limit,
    });

    if let Some(dir) = &cfg.buffer_dir {
        match FileBuffer::open(dir).await {
            Ok(b) => {
                let buffer: Arc<dyn StreamBuffer> = Arc::new(b);
                orch = orch.with_buffer(buffer, cfg.topics.clone());
            }
            Err(e) => {
                tracing::warn!(error = %e, dir = %dir.display(), "buffer unavailable, continuing without it");
            }
        }
    }
    Ok(orch)
}
