//! Error types for gpuq

use thiserror::Error;

/// Main error type for gpuq
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Telemetry session could not be established. Fatal: the dispatcher
    /// cannot run without device telemetry and never retries this.
    #[error("Monitor initialization failed: {0}")]
    MonitorInit(String),

    /// Transient telemetry failure during a poll. Treated as "no device
    /// free this cycle" and retried after the normal backoff.
    #[error("Monitor query failed: {0}")]
    MonitorQuery(String),

    /// Child process could not be created
    #[error("Launch failed: {0}")]
    Launch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker task failed to join
    #[error("Worker error: {0}")]
    Worker(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for gpuq operations
pub type DispatchResult<T> = Result<T, DispatchError>;

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for DispatchError {
    fn from(err: toml::de::Error) -> Self {
        DispatchError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DispatchError::MonitorInit("driver not loaded".to_string());
        assert_eq!(
            err.to_string(),
            "Monitor initialization failed: driver not loaded"
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DispatchError = io_err.into();
        assert!(matches!(err, DispatchError::Io(_)));
    }
}
