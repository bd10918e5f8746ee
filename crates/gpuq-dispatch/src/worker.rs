//! Dispatch worker state machine.
//!
//! A worker loops `Idle -> Polling -> Launching -> Running -> Idle`,
//! terminating when it dequeues the shutdown sentinel. Every suspension
//! point (blocking dequeue, backoff sleep, attached child wait) observes
//! the cancellation token so the supervisor can stop a run promptly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use gpuq_core::{JobRecord, JobSpec};
use gpuq_monitor::DeviceMonitor;
use gpuq_runtime::{LaunchHandle, Launcher};

use crate::queue::{JobQueue, QueueItem};
use crate::reservation::ReservationLedger;

/// One dispatch worker pulling jobs from the shared queue
pub struct DispatchWorker {
    id: usize,
    queue: Arc<JobQueue>,
    monitor: Arc<dyn DeviceMonitor>,
    ledger: Arc<ReservationLedger>,
    launcher: Arc<dyn Launcher>,
    poll_backoff: Duration,
    cancel: CancellationToken,
}

impl DispatchWorker {
    /// Create a worker bound to the shared queue, monitor, and ledger
    pub fn new(
        id: usize,
        queue: Arc<JobQueue>,
        monitor: Arc<dyn DeviceMonitor>,
        ledger: Arc<ReservationLedger>,
        launcher: Arc<dyn Launcher>,
        poll_backoff: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            queue,
            monitor,
            ledger,
            launcher,
            poll_backoff,
            cancel,
        }
    }

    /// Run until the shutdown sentinel is dequeued or cancellation is
    /// requested. Returns the record of every job this worker handled.
    pub async fn run(self) -> Vec<JobRecord> {
        let mut records = Vec::new();
        info!(worker = self.id, "Dispatch worker started");

        loop {
            let job = tokio::select! {
                _ = self.cancel.cancelled() => break,
                item = self.queue.pop() => match item {
                    QueueItem::Job(job) => job,
                    QueueItem::Shutdown => {
                        debug!(worker = self.id, "Shutdown sentinel dequeued");
                        break;
                    }
                },
            };
            records.push(self.dispatch(job).await);
        }

        info!(
            worker = self.id,
            jobs = records.len(),
            "Dispatch worker terminated"
        );
        records
    }

    /// Poll until a device can be reserved for the job, then launch it.
    ///
    /// Retries are unbounded: a job waits as long as it takes for a
    /// device to come free.
    async fn dispatch(&self, job: JobSpec) -> JobRecord {
        loop {
            let snapshot = match self.monitor.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    // Transient telemetry failure: same as "no device
                    // free this cycle".
                    warn!(worker = self.id, error = %e, "Device poll failed");
                    if !self.backoff().await {
                        return JobRecord::interrupted(&job, None);
                    }
                    continue;
                }
            };

            let discipline = self.launcher.discipline();
            match self.ledger.claim(&snapshot, job.id, discipline).await {
                Some(device) => return self.launch(job, device).await,
                None => {
                    debug!(
                        worker = self.id,
                        job_id = %job.id,
                        idle = snapshot.idle_count(),
                        "No device available, backing off"
                    );
                    if !self.backoff().await {
                        return JobRecord::interrupted(&job, None);
                    }
                }
            }
        }
    }

    async fn launch(&self, job: JobSpec, device: u32) -> JobRecord {
        let launched_at = Utc::now();

        match self.launcher.launch(&job, device).await {
            Ok(LaunchHandle::Detached { pid }) => {
                // The reservation stays with the ledger until the device
                // is observed busy or the grace period runs out.
                JobRecord::launched(&job, device, pid)
            }
            Ok(LaunchHandle::Attached { pid, mut child }) => {
                let status = tokio::select! {
                    _ = self.cancel.cancelled() => {
                        // The child keeps running; the dispatcher never
                        // manages job lifetimes beyond launch.
                        self.ledger.release(device).await;
                        return JobRecord::interrupted(&job, Some(device));
                    }
                    status = child.wait() => status,
                };
                self.ledger.release(device).await;

                match status {
                    Ok(status) => {
                        let exit_code = status.code();
                        if exit_code != Some(0) {
                            warn!(
                                job_id = %job.id,
                                exit_code = ?exit_code,
                                "Job exited non-zero"
                            );
                        }
                        JobRecord::completed(&job, device, pid, launched_at, exit_code)
                    }
                    Err(e) => {
                        warn!(job_id = %job.id, error = %e, "Failed to await child exit");
                        JobRecord::completed(&job, device, pid, launched_at, None)
                    }
                }
            }
            Err(e) => {
                // The device was never consumed; free it for the next
                // claim and move on to the next job.
                self.ledger.release(device).await;
                warn!(job_id = %job.id, device, error = %e, "Launch failed");
                JobRecord::launch_failed(&job, device, e.to_string())
            }
        }
    }

    /// Cancellable backoff sleep. Returns false when shutdown was
    /// requested during the wait.
    async fn backoff(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(self.poll_backoff) => true,
        }
    }
}
