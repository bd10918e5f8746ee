//! Append-only run log.
//!
//! Each launch appends one structured JSON line identifying the job and
//! the device it was bound to. In the detached discipline the children's
//! combined stdout/stderr streams are redirected into the same file, so
//! the log interleaves launch records with job output, like a classic
//! nohup log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use gpuq_core::DispatchResult;

/// One launch record, serialized as a single JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLogRecord {
    /// When the child was spawned
    pub timestamp: DateTime<Utc>,
    /// Job identifier
    pub job_id: Uuid,
    /// Job name
    pub job_name: String,
    /// Device index the job was bound to
    pub device: u32,
    /// Child process id, when available
    pub pid: Option<u32>,
}

/// Append-only text file recording every launch
#[derive(Debug, Clone)]
pub struct RunLog {
    path: PathBuf,
}

impl RunLog {
    /// Create a run log writing to the given path. The file is created
    /// on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one launch record as a JSON line
    pub fn append(&self, record: &RunLogRecord) -> DispatchResult<()> {
        let mut file = self.open_append()?;
        let line = serde_json::to_string(record)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// An append-mode handle suitable for redirecting a child's output
    /// stream into the log
    pub fn output_handle(&self) -> DispatchResult<File> {
        self.open_append()
    }

    fn open_append(&self) -> DispatchResult<File> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, device: u32) -> RunLogRecord {
        RunLogRecord {
            timestamp: Utc::now(),
            job_id: Uuid::new_v4(),
            job_name: name.to_string(),
            device,
            pid: Some(4242),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("dispatch.log"));

        log.append(&record("job-a", 0)).unwrap();
        log.append(&record("job-b", 3)).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: RunLogRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.job_name, "job-a");
        assert_eq!(first.device, 0);

        let second: RunLogRecord = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.device, 3);
    }

    #[test]
    fn test_output_handle_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = RunLog::new(dir.path().join("dispatch.log"));

        log.append(&record("job-a", 1)).unwrap();
        let mut handle = log.output_handle().unwrap();
        writeln!(handle, "child output line").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert!(content.ends_with("child output line\n"));
        assert_eq!(content.lines().count(), 2);
    }
}
