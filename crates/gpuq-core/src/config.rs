//! Configuration types for the dispatcher

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::LaunchDiscipline;

/// Dispatcher configuration.
///
/// Loadable from a TOML file; every field has a default so a config file
/// only needs to name what it changes. The two poll backoffs observed in
/// production sweeps (1800 s and 900 s) are both reachable through
/// `poll_backoff_secs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Number of dispatch workers. `None` runs one worker per job.
    pub workers: Option<usize>,
    /// Delay between worker activations, in seconds
    pub stagger_secs: u64,
    /// Sleep between device polls when no device is free, in seconds
    pub poll_backoff_secs: u64,
    /// How long a detached reservation is held while the device still
    /// looks idle, in seconds. Covers child startup time before the
    /// device shows utilization; expired reservations are released so a
    /// child that died at startup cannot starve the queue.
    pub reservation_grace_secs: u64,
    /// Launch discipline for all jobs in the run
    pub discipline: LaunchDiscipline,
    /// Interpreter or binary every job is launched with
    pub interpreter: PathBuf,
    /// Training entrypoint passed as the first argument, if any
    pub entrypoint: Option<PathBuf>,
    /// Append-only run log path. Detached children also write their
    /// combined output here.
    pub run_log: Option<PathBuf>,
    /// Where to write the JSON completion report
    pub report: Option<PathBuf>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            workers: None,
            stagger_secs: 20,
            poll_backoff_secs: 1800,
            reservation_grace_secs: 300,
            discipline: LaunchDiscipline::Detached,
            interpreter: PathBuf::from("python3"),
            entrypoint: None,
            run_log: None,
            report: None,
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::DispatchError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::DispatchError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::DispatchError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Stagger delay between worker activations
    pub fn stagger(&self) -> Duration {
        Duration::from_secs(self.stagger_secs)
    }

    /// Backoff between device polls
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_backoff_secs)
    }

    /// Grace period for detached reservations
    pub fn reservation_grace(&self) -> Duration {
        Duration::from_secs(self.reservation_grace_secs)
    }

    /// Worker count for a run of `job_count` jobs: the configured count,
    /// or one worker per job when unset
    pub fn effective_workers(&self, job_count: usize) -> usize {
        self.workers.unwrap_or(job_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DispatchConfig::default();
        assert_eq!(config.stagger_secs, 20);
        assert_eq!(config.poll_backoff_secs, 1800);
        assert_eq!(config.discipline, LaunchDiscipline::Detached);
        assert_eq!(config.effective_workers(7), 7);
    }

    #[test]
    fn test_config_parse() {
        let toml_str = r#"
workers = 4
poll_backoff_secs = 900
discipline = "attached"
interpreter = "python3"
entrypoint = "train.py"
run_log = "dispatch.log"
"#;
        let config: DispatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.poll_backoff(), Duration::from_secs(900));
        assert_eq!(config.discipline, LaunchDiscipline::Attached);
        assert_eq!(config.entrypoint, Some(PathBuf::from("train.py")));
        assert_eq!(config.effective_workers(7), 4);
        // Unnamed fields keep their defaults
        assert_eq!(config.stagger_secs, 20);
    }
}
