//! Launcher trait definitions

use async_trait::async_trait;
use gpuq_core::{DispatchResult, JobSpec, LaunchDiscipline};
use tokio::process::Child;

/// Handle to a launched child process
#[derive(Debug)]
pub enum LaunchHandle {
    /// Child runs in its own process group; exit status is not tracked
    Detached {
        /// OS process id, when the runtime reports one
        pid: Option<u32>,
    },
    /// Child is owned by the worker, which waits for it to exit
    Attached {
        /// OS process id, when the runtime reports one
        pid: Option<u32>,
        /// The child process to wait on
        child: Child,
    },
}

impl LaunchHandle {
    /// OS process id of the child, when available
    pub fn pid(&self) -> Option<u32> {
        match self {
            LaunchHandle::Detached { pid } => *pid,
            LaunchHandle::Attached { pid, .. } => *pid,
        }
    }
}

/// Launcher trait for starting jobs on a bound device
#[async_trait]
pub trait Launcher: Send + Sync {
    /// Launch a job as a child process bound to the given device index.
    ///
    /// The child's environment restricts device visibility to exactly
    /// that index; the parent environment is never touched.
    async fn launch(&self, job: &JobSpec, device: u32) -> DispatchResult<LaunchHandle>;

    /// Which launch discipline this launcher uses
    fn discipline(&self) -> LaunchDiscipline;
}
