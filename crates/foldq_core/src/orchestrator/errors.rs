//! Error types for the orchestrator.
//!
//! Two tiers:
//! - `StepError`: one external invocation could not be carried out. The job
//!   fails, the worker goes on.
//! - `WorkerError`: the run directory or the settings are unusable. The
//!   process stops.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::jobs::LifecycleError;

/// Error from an external step, with operation context.
#[derive(Error, Debug)]
pub enum StepError {
    /// Preparing files for the tool failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    /// The tool could not be started at all.
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    /// The step's log file could not be opened.
    #[error("Cannot open log '{}': {source}", path.display())]
    Log {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StepError {
    /// Create an I/O error with context.
    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a spawn error.
    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }
}

/// Error that stops the worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Settings missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A descriptor could not be filed, or the queue could not be scanned.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The run directory has no queue directory.
    #[error("Queue directory '{}' does not exist", .0.display())]
    QueueMissing(PathBuf),

    /// Waiting on the queue failed.
    #[error("I/O error in {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

/// Result type for step operations.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_error_displays_context() {
        let err = StepError::spawn(
            "/env/bin/python3",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/env/bin/python3"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn worker_error_wraps_config_error() {
        let err: WorkerError = ConfigError::NoVersions.into();
        assert!(matches!(err, WorkerError::Config(ConfigError::NoVersions)));
        assert_eq!(err.to_string(), ConfigError::NoVersions.to_string());
    }
}
