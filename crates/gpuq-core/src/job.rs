//! Job descriptors and launch disciplines

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Launch specification for a single compute job.
///
/// A job is an opaque command line: the dispatcher never interprets what
/// the child does, it only binds it to a device and starts it. Immutable
/// once enqueued; consumed exactly once by a dispatch worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Unique job identifier
    pub id: Uuid,
    /// Human-readable name, used in logs and the completion report
    pub name: String,
    /// Executable command (interpreter or binary)
    pub program: String,
    /// Argument string, tokenized on whitespace at launch
    pub args: String,
}

impl JobSpec {
    /// Create a new job spec
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            program: program.into(),
            args: args.into(),
        }
    }

    /// The argument string split into whitespace-separated tokens
    pub fn argv(&self) -> impl Iterator<Item = &str> {
        self.args.split_whitespace()
    }
}

/// How a dispatch worker relates to the child process it launches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchDiscipline {
    /// Child starts in its own process group and survives dispatcher
    /// exit; the worker moves on to the next job without waiting.
    /// Throughput-oriented, at the cost of exit-status visibility.
    Detached,
    /// Worker blocks until the child exits, then records the exit code
    Attached,
}

impl std::fmt::Display for LaunchDiscipline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LaunchDiscipline::Detached => write!(f, "detached"),
            LaunchDiscipline::Attached => write!(f, "attached"),
        }
    }
}

impl std::str::FromStr for LaunchDiscipline {
    type Err = crate::DispatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "detached" => Ok(LaunchDiscipline::Detached),
            "attached" => Ok(LaunchDiscipline::Attached),
            other => Err(crate::DispatchError::Config(format!(
                "Unknown launch discipline: {} (expected 'detached' or 'attached')",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_spec_new() {
        let job = JobSpec::new("sweep-0", "python3", "train.py --lr 0.1");
        assert_eq!(job.name, "sweep-0");
        assert_eq!(job.program, "python3");
    }

    #[test]
    fn test_argv_tokenization() {
        let job = JobSpec::new("j", "python3", "train.py  --lr 0.1\t--epochs 90");
        let argv: Vec<&str> = job.argv().collect();
        assert_eq!(argv, vec!["train.py", "--lr", "0.1", "--epochs", "90"]);
    }

    #[test]
    fn test_argv_empty() {
        let job = JobSpec::new("j", "true", "");
        assert_eq!(job.argv().count(), 0);
    }

    #[test]
    fn test_discipline_from_str() {
        assert_eq!(
            "detached".parse::<LaunchDiscipline>().unwrap(),
            LaunchDiscipline::Detached
        );
        assert_eq!(
            "Attached".parse::<LaunchDiscipline>().unwrap(),
            LaunchDiscipline::Attached
        );
        assert!("forked".parse::<LaunchDiscipline>().is_err());
    }
}
