// tessera/core/sequencer/src/scheduler.rs

//! Periodic pool maintenance driven by an explicit task list.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pool::TxPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolTask {
    ReportStats,
    EvictStale,
    ProcessQueue,
    ProcessPending,
}

pub struct PoolScheduler {
    pool: Arc<TxPool>,
    tasks: Vec<(PoolTask, Duration)>,
    cancel: CancellationToken,
}

impl PoolScheduler {
    /// Schedules the four maintenance tasks at the pool's configured
    /// intervals. Tasks due at the same instant run in list order.
    pub fn new(pool: Arc<TxPool>, cancel: CancellationToken) -> Self {
        let config = pool.config();
        let tasks = vec![
            (PoolTask::ReportStats, Duration::from_secs(config.stats_interval_secs)),
            (PoolTask::EvictStale, Duration::from_secs(config.evict_interval_secs)),
            (PoolTask::ProcessQueue, Duration::from_secs(config.process_queue_interval_secs)),
            (PoolTask::ProcessPending, Duration::from_secs(config.process_pending_interval_secs)),
        ];
        Self { pool, tasks, cancel }
    }

    pub fn tasks(&self) -> &[(PoolTask, Duration)] {
        &self.tasks
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the cancellation token fires.
    pub async fn run(self) {
        if self.tasks.is_empty() {
            self.cancel.cancelled().await;
            return;
        }
        let start = Instant::now();
        let mut deadlines: Vec<Instant> = self
            .tasks
            .iter()
            .map(|(_, interval)| start + *interval)
            .collect();
        info!(tasks = self.tasks.len(), "Transaction pool scheduler started");

        loop {
            let mut next = 0;
            for (index, deadline) in deadlines.iter().enumerate() {
                if *deadline < deadlines[next] {
                    next = index;
                }
            }
            let deadline = deadlines[next];

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    info!("Transaction pool scheduler stopped");
                    return;
                }
                _ = sleep_until(deadline) => {}
            }

            let (task, interval) = self.tasks[next];
            debug!(?task, "Running pool task");
            self.run_task(task).await;
            deadlines[next] = deadline + interval;
        }
    }

    async fn run_task(&self, task: PoolTask) {
        match task {
            PoolTask::ReportStats => self.pool.report_stats().await,
            PoolTask::EvictStale => self.pool.evict_stale().await,
            PoolTask::ProcessQueue => self.pool.process_queue().await,
            PoolTask::ProcessPending => self.pool.process_pending().await,
        }
    }
}
