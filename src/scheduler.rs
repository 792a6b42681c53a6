// src/scheduler.rs
//! Runs ingestion cycles forever at a fixed interval, plus one-off background cycles.
//!
//! A cycle that errors (or panics) is logged and recorded on the status board;
//! the next one starts after the same delay. Stopping lets the in-flight cycle
//! finish and starts no new one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::ingest::types::ContentSource;
use crate::orchestrator::{CycleStats, Orchestrator};

#[async_trait]
pub trait CycleJob: Send + Sync {
    async fn run(&self) -> anyhow::Result<CycleStats>;
}

/// The production job: one `Orchestrator::run_cycle` over a fixed source list.
pub struct PipelineJob {
    orchestrator: Arc<Orchestrator>,
    client: Arc<dyn ContentSource>,
    sources: Vec<String>,
}

impl PipelineJob {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        client: Arc<dyn ContentSource>,
        sources: Vec<String>,
    ) -> Self {
        Self {
            orchestrator,
            client,
            sources,
        }
    }
}

#[async_trait]
impl CycleJob for PipelineJob {
    async fn run(&self) -> anyhow::Result<CycleStats> {
        Ok(self
            .orchestrator
            .run_cycle(&self.sources, self.client.as_ref())
            .await)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleStatus {
    pub running: bool,
    pub cycles_run: u64,
    pub last_stats: Option<CycleStats>,
    pub last_error: Option<String>,
    pub last_finished: Option<DateTime<Utc>>,
}

/// Shared view of the latest cycle outcome. Cheap to clone.
#[derive(Clone, Default)]
pub struct StatusBoard {
    inner: Arc<RwLock<CycleStatus>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> CycleStatus {
        self.inner.read().clone()
    }

    /// Marks a cycle as running. False if one is already running.
    fn try_begin(&self) -> bool {
        let mut g = self.inner.write();
        if g.running {
            return false;
        }
        g.running = true;
        true
    }

    fn finish(&self, outcome: Result<CycleStats, String>) {
        let mut g = self.inner.write();
        g.running = false;
        g.cycles_run += 1;
        g.last_finished = Some(Utc::now());
        match outcome {
            Ok(stats) => {
                g.last_stats = Some(stats);
                g.last_error = None;
            }
            Err(e) => g.last_error = Some(e),
        }
    }
}

/// Runs the job in its own task so a panic is contained and reported like an error.
async fn run_once(job: Arc<dyn CycleJob>) -> Result<CycleStats, String> {
    match tokio::spawn(async move { job.run().await }).await {
        Ok(Ok(stats)) => Ok(stats),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(join) => Err(format!("cycle task failed: {join}")),
    }
}

/// Fire-and-forget single cycle. Returns `None` (and does nothing) when a
/// cycle is already running on this board.
pub fn spawn_background_cycle(job: Arc<dyn CycleJob>, board: StatusBoard) -> Option<JoinHandle<()>> {
    if !board.try_begin() {
        tracing::info!(target: "scheduler", "background cycle skipped, one is already running");
        return None;
    }
    Some(tokio::spawn(async move {
        let outcome = run_once(job).await;
        if let Err(e) = &outcome {
            counter!("cycle_errors_total").increment(1);
            tracing::error!(target: "scheduler", error = %e, "background cycle failed");
        }
        board.finish(outcome);
    }))
}

pub struct Scheduler {
    job: Arc<dyn CycleJob>,
    interval: Duration,
    board: StatusBoard,
}

pub struct SchedulerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signals stop and waits for the in-flight cycle (if any) to finish.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(target: "scheduler", error = %e, "scheduler task ended abnormally");
        }
    }
}

impl Scheduler {
    pub fn new(job: Arc<dyn CycleJob>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            board: StatusBoard::new(),
        }
    }

    pub fn with_board(mut self, board: StatusBoard) -> Self {
        self.board = board;
        self
    }

    pub fn board(&self) -> StatusBoard {
        self.board.clone()
    }

    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(self.run(rx));
        SchedulerHandle { stop: tx, task }
    }

    /// First cycle starts immediately; then one every `interval` until `stop` flips to true.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        tracing::info!(target: "scheduler", interval_secs = self.interval.as_secs(), "scheduler started");
        loop {
            if *stop.borrow() {
                break;
            }

            if self.board.try_begin() {
                let outcome = run_once(self.job.clone()).await;
                match &outcome {
                    Ok(stats) => tracing::debug!(target: "scheduler", processed = stats.processed(), "cycle done"),
                    Err(e) => {
                        counter!("cycle_errors_total").increment(1);
                        tracing::error!(target: "scheduler", error = %e, "cycle failed, retrying after interval");
                    }
                }
                self.board.finish(outcome);
            } else {
                tracing::info!(target: "scheduler", "tick skipped, a background cycle is running");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(target: "scheduler", "scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counting {
        started: AtomicU64,
        finished: AtomicU64,
        work: Duration,
        fail: bool,
    }

    impl Counting {
        fn new(work: Duration, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                started: AtomicU64::new(0),
                finished: AtomicU64::new(0),
                work,
                fail,
            })
        }
    }

    #[async_trait]
    impl CycleJob for Counting {
        async fn run(&self) -> anyhow::Result<CycleStats> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("reddit unreachable");
            }
            Ok(CycleStats::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_repeat_at_fixed_interval() {
        let job = Counting::new(Duration::ZERO, false);
        let handle = Scheduler::new(job.clone(), Duration::from_secs(300)).spawn();

        tokio::time::sleep(Duration::from_secs(601)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 3);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(3000)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_cycles_are_swallowed() {
        let job = Counting::new(Duration::ZERO, true);
        let sched = Scheduler::new(job.clone(), Duration::from_secs(300));
        let board = sched.board();
        let handle = sched.spawn();

        tokio::time::sleep(Duration::from_secs(301)).await;
        let status = board.snapshot();
        assert_eq!(status.cycles_run, 2);
        assert!(status.last_error.unwrap().contains("reddit unreachable"));
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_finishes_in_flight_cycle() {
        let job = Counting::new(Duration::from_secs(10), false);
        let handle = Scheduler::new(job.clone(), Duration::from_secs(300)).spawn();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
        assert_eq!(job.finished.load(Ordering::SeqCst), 0);

        handle.stop().await;
        assert_eq!(job.finished.load(Ordering::SeqCst), 1);
        assert_eq!(job.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_cycle_reports_through_board() {
        let job = Counting::new(Duration::from_secs(5), false);
        let board = StatusBoard::new();

        let first = spawn_background_cycle(job.clone(), board.clone()).expect("spawned");
        assert!(board.snapshot().running);
        assert!(spawn_background_cycle(job.clone(), board.clone()).is_none());

        first.await.unwrap();
        let status = board.snapshot();
        assert!(!status.running);
        assert_eq!(status.cycles_run, 1);
        assert!(status.last_stats.is_some());
        assert!(status.last_error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_tick_skips_while_background_cycle_runs() {
        let job = Counting::new(Duration::from_secs(10), false);
        let board = StatusBoard::new();
        let background = spawn_background_cycle(job.clone(), board.clone()).expect("spawned");

        let handle = Scheduler::new(job.clone(), Duration::from_secs(300))
            .with_board(board.clone())
            .spawn();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 1);

        background.await.unwrap();
        assert!(!board.snapshot().running);
        assert_eq!(board.snapshot().cycles_run, 1);

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(job.started.load(Ordering::SeqCst), 2);
        handle.stop().await;
        assert_eq!(board.snapshot().cycles_run, 2);
    }
}
