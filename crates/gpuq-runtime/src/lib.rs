//! gpuq-runtime: Process launch layer
//!
//! This crate turns a bound (job, device) pair into a running child
//! process:
//! - `Launcher` trait with detached and attached disciplines behind one
//!   interface
//! - `ProcessLauncher` implementation over `tokio::process`
//! - Append-only run log

pub mod process;
pub mod run_log;
pub mod traits;

pub use process::{ProcessLauncher, ProcessLauncherConfig};
pub use run_log::{RunLog, RunLogRecord};
pub use traits::{LaunchHandle, Launcher};
