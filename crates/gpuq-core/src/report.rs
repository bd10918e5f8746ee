//! Per-job records and the end-of-run completion report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::JobSpec;

/// Final outcome of a dispatched job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum JobOutcome {
    /// Child started in its own process group; exit status is not tracked
    Launched,
    /// Attached child exited. `exit_code` is `None` when the child was
    /// terminated by a signal. A non-zero code is recorded, never retried.
    Completed { exit_code: Option<i32> },
    /// Child process could not be created
    LaunchFailed { reason: String },
    /// Shutdown was requested while the job was waiting for a device or
    /// for its child to exit
    Interrupted,
}

/// What happened to one job: launch time, bound device, and outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier
    pub job_id: Uuid,
    /// Job name
    pub job_name: String,
    /// Device index the job was bound to, if a reservation was granted
    pub device: Option<u32>,
    /// Child process id, if the child was spawned
    pub pid: Option<u32>,
    /// When the child was launched
    pub launched_at: Option<DateTime<Utc>>,
    /// Final outcome
    pub outcome: JobOutcome,
}

impl JobRecord {
    /// Record a successful detached launch
    pub fn launched(job: &JobSpec, device: u32, pid: Option<u32>) -> Self {
        Self {
            job_id: job.id,
            job_name: job.name.clone(),
            device: Some(device),
            pid,
            launched_at: Some(Utc::now()),
            outcome: JobOutcome::Launched,
        }
    }

    /// Record an attached launch that ran to child exit
    pub fn completed(
        job: &JobSpec,
        device: u32,
        pid: Option<u32>,
        launched_at: DateTime<Utc>,
        exit_code: Option<i32>,
    ) -> Self {
        Self {
            job_id: job.id,
            job_name: job.name.clone(),
            device: Some(device),
            pid,
            launched_at: Some(launched_at),
            outcome: JobOutcome::Completed { exit_code },
        }
    }

    /// Record a failed spawn
    pub fn launch_failed(job: &JobSpec, device: u32, reason: String) -> Self {
        Self {
            job_id: job.id,
            job_name: job.name.clone(),
            device: Some(device),
            pid: None,
            launched_at: None,
            outcome: JobOutcome::LaunchFailed { reason },
        }
    }

    /// Record a job abandoned because shutdown was requested
    pub fn interrupted(job: &JobSpec, device: Option<u32>) -> Self {
        Self {
            job_id: job.id,
            job_name: job.name.clone(),
            device,
            pid: None,
            launched_at: None,
            outcome: JobOutcome::Interrupted,
        }
    }

    /// True when the job failed to launch or exited non-zero
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            JobOutcome::LaunchFailed { .. } => true,
            JobOutcome::Completed { exit_code } => *exit_code != Some(0),
            _ => false,
        }
    }
}

/// Everything that happened during one dispatcher run.
///
/// Emitted by the supervisor after all workers have joined; a run
/// completes with a report enumerating every job's outcome even when
/// individual jobs failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Total jobs submitted
    pub total_jobs: usize,
    /// Detached launches
    pub launched: usize,
    /// Attached jobs that ran to exit (any code)
    pub completed: usize,
    /// Jobs whose child could not be spawned
    pub launch_failures: usize,
    /// Attached jobs that exited non-zero or died on a signal
    pub nonzero_exits: usize,
    /// Jobs abandoned due to shutdown
    pub interrupted: usize,
    /// Per-job records, ordered by launch time
    pub records: Vec<JobRecord>,
}

impl CompletionReport {
    /// Build a report from worker records, ordering them by launch time
    pub fn new(
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        mut records: Vec<JobRecord>,
    ) -> Self {
        records.sort_by_key(|r| r.launched_at);

        let launched = records
            .iter()
            .filter(|r| r.outcome == JobOutcome::Launched)
            .count();
        let completed = records
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Completed { .. }))
            .count();
        let launch_failures = records
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::LaunchFailed { .. }))
            .count();
        let nonzero_exits = records
            .iter()
            .filter(|r| matches!(r.outcome, JobOutcome::Completed { exit_code } if exit_code != Some(0)))
            .count();
        let interrupted = records
            .iter()
            .filter(|r| r.outcome == JobOutcome::Interrupted)
            .count();

        Self {
            started_at,
            finished_at,
            total_jobs: records.len(),
            launched,
            completed,
            launch_failures,
            nonzero_exits,
            interrupted,
            records,
        }
    }
}
