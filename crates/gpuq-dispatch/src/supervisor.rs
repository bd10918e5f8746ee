//! Worker supervisor.
//!
//! Owns the job queue and the dispatch workers for one run: enqueues the
//! backlog, starts workers with staggered activation, joins them, and
//! assembles the completion report.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::info;

use gpuq_core::{
    CompletionReport, DispatchConfig, DispatchError, DispatchResult, JobRecord, JobSpec,
};
use gpuq_monitor::DeviceMonitor;
use gpuq_runtime::Launcher;

use crate::queue::{JobQueue, QueueItem};
use crate::reservation::ReservationLedger;
use crate::worker::DispatchWorker;

/// Supervises one dispatch run
pub struct Supervisor {
    config: DispatchConfig,
    monitor: Arc<dyn DeviceMonitor>,
    launcher: Arc<dyn Launcher>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor over the given monitor and launcher
    pub fn new(
        config: DispatchConfig,
        monitor: Arc<dyn DeviceMonitor>,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            config,
            monitor,
            launcher,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops the whole run when cancelled. Workers observe it
    /// at every suspension point.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Dispatch every job and return the completion report.
    ///
    /// Only a fatal monitor-initialization failure may abort a run
    /// before this point; from here on every per-job condition is
    /// absorbed into the report.
    pub async fn run(&self, jobs: Vec<JobSpec>) -> DispatchResult<CompletionReport> {
        let started_at = Utc::now();

        if jobs.is_empty() {
            return Ok(CompletionReport::new(started_at, Utc::now(), Vec::new()));
        }

        let worker_count = self.config.effective_workers(jobs.len()).max(1);
        info!(
            jobs = jobs.len(),
            workers = worker_count,
            discipline = %self.config.discipline,
            "Dispatch run starting"
        );

        let queue = Arc::new(JobQueue::new());
        for job in jobs {
            queue.push(job);
        }
        // One sentinel per worker so every worker drains and terminates.
        for _ in 0..worker_count {
            queue.push_shutdown();
        }

        let ledger = Arc::new(ReservationLedger::new(self.config.reservation_grace()));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            // Staggered activation: keeps the workers' first polls from
            // hitting the telemetry interface all at once.
            if worker_id > 0 {
                let stagger_done = tokio::select! {
                    _ = self.cancel.cancelled() => false,
                    _ = tokio::time::sleep(self.config.stagger()) => true,
                };
                if !stagger_done {
                    break;
                }
            }

            let worker = DispatchWorker::new(
                worker_id,
                queue.clone(),
                self.monitor.clone(),
                ledger.clone(),
                self.launcher.clone(),
                self.config.poll_backoff(),
                self.cancel.clone(),
            );
            handles.push(tokio::spawn(worker.run()));
        }

        let mut records: Vec<JobRecord> = Vec::new();
        for result in join_all(handles).await {
            match result {
                Ok(worker_records) => records.extend(worker_records),
                Err(e) => return Err(DispatchError::Worker(e.to_string())),
            }
        }

        // Jobs still queued after a cancellation are part of the report
        // too: the run always enumerates every submitted job.
        for item in queue.drain().await {
            if let QueueItem::Job(job) = item {
                records.push(JobRecord::interrupted(&job, None));
            }
        }

        let report = CompletionReport::new(started_at, Utc::now(), records);
        info!(
            total = report.total_jobs,
            launched = report.launched,
            completed = report.completed,
            launch_failures = report.launch_failures,
            interrupted = report.interrupted,
            "Dispatch run finished"
        );
        Ok(report)
    }
}
