//! Process-based launcher implementation.
//!
//! Launches each job as a child process whose environment restricts
//! device visibility to exactly the bound device index. Supports both
//! launch disciplines behind the [`Launcher`] interface:
//!
//! - *detached*: the child starts in its own process group, its combined
//!   output goes to the run log, and the worker moves on without waiting
//! - *attached*: the worker owns the child and waits for it to exit

use chrono::Utc;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use gpuq_core::{
    DispatchError, DispatchResult, JobSpec, LaunchDiscipline, DEVICE_VISIBILITY_VAR,
};

use crate::run_log::{RunLog, RunLogRecord};
use crate::traits::{LaunchHandle, Launcher};

/// Process launcher configuration
#[derive(Debug, Clone)]
pub struct ProcessLauncherConfig {
    /// Launch discipline for every job
    pub discipline: LaunchDiscipline,
    /// Run log path. Detached children write their combined output here.
    pub run_log: Option<PathBuf>,
}

impl Default for ProcessLauncherConfig {
    fn default() -> Self {
        Self {
            discipline: LaunchDiscipline::Detached,
            run_log: None,
        }
    }
}

/// Launcher that runs jobs as OS child processes
pub struct ProcessLauncher {
    discipline: LaunchDiscipline,
    run_log: Option<RunLog>,
}

impl ProcessLauncher {
    /// Create a new process launcher
    pub fn new(config: ProcessLauncherConfig) -> Self {
        Self {
            discipline: config.discipline,
            run_log: config.run_log.map(RunLog::new),
        }
    }

    /// Build the command for a job bound to a device.
    ///
    /// The visibility variable is set only on the child's environment
    /// map; the parent's environment is never mutated here.
    fn build_command(&self, job: &JobSpec, device: u32) -> Command {
        let mut cmd = Command::new(&job.program);
        cmd.args(job.argv());
        cmd.env(DEVICE_VISIBILITY_VAR, device.to_string());
        cmd.stdin(Stdio::null());
        cmd
    }

    fn configure_detached(&self, cmd: &mut Command) -> DispatchResult<()> {
        // Own process group so the child survives dispatcher exit and
        // never receives the dispatcher's terminal signals.
        #[cfg(unix)]
        cmd.process_group(0);

        match &self.run_log {
            Some(log) => {
                let stdout = log.output_handle()?;
                let stderr = log.output_handle()?;
                cmd.stdout(Stdio::from(stdout));
                cmd.stderr(Stdio::from(stderr));
            }
            None => {
                cmd.stdout(Stdio::null());
                cmd.stderr(Stdio::null());
            }
        }
        Ok(())
    }

    fn record_launch(&self, job: &JobSpec, device: u32, pid: Option<u32>) {
        if let Some(log) = &self.run_log {
            let record = RunLogRecord {
                timestamp: Utc::now(),
                job_id: job.id,
                job_name: job.name.clone(),
                device,
                pid,
            };
            // The job is already running; a log write failure is not a
            // launch failure.
            if let Err(e) = log.append(&record) {
                warn!(job_id = %job.id, error = %e, "Failed to append run log record");
            }
        }
    }
}

#[async_trait::async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, job: &JobSpec, device: u32) -> DispatchResult<LaunchHandle> {
        let mut cmd = self.build_command(job, device);

        match self.discipline {
            LaunchDiscipline::Detached => self.configure_detached(&mut cmd)?,
            LaunchDiscipline::Attached => {
                cmd.stdout(Stdio::inherit());
                cmd.stderr(Stdio::inherit());
            }
        }

        info!(
            job_id = %job.id,
            job_name = %job.name,
            device = device,
            discipline = %self.discipline,
            "Launching job"
        );

        match cmd.spawn() {
            Ok(mut child) => {
                let pid = child.id();
                debug!(job_id = %job.id, pid = ?pid, "Child process spawned");
                self.record_launch(job, device, pid);

                match self.discipline {
                    LaunchDiscipline::Detached => {
                        // Reap the child in the background so it never
                        // lingers as a zombie while the dispatcher runs.
                        tokio::spawn(async move {
                            let _ = child.wait().await;
                        });
                        Ok(LaunchHandle::Detached { pid })
                    }
                    LaunchDiscipline::Attached => Ok(LaunchHandle::Attached { pid, child }),
                }
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "Failed to spawn child process");
                Err(DispatchError::Launch(e.to_string()))
            }
        }
    }

    fn discipline(&self) -> LaunchDiscipline {
        self.discipline
    }
}
