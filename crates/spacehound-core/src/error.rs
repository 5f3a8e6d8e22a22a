/// Error types for the spacehound engine.
///
/// Per-entry I/O failures never become an `EngineError`: they are absorbed
/// where they happen and the entry is left out of every aggregate. Only
/// whole-job failures reach this type, and only its coarse [`FailureKind`]
/// plus a message string cross the worker boundary.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request carried no path at all.
    #[error("path is required")]
    EmptyPath,

    /// The scan root itself could not be opened, so the job never started.
    #[error("cannot read scan root {}: {source}", path.display())]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The OS refused to create a worker or relay thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The worker went away without sending a terminal message.
    #[error("worker exited unexpectedly: {0}")]
    WorkerExited(String),

    /// A job-level failure relayed from a worker.
    #[error("{0}")]
    Failed(ScanFailure),

    #[error("scan cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Coarse failure categories exposed to callers instead of raw OS errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidInput,
    PathAccess,
    WorkerFailure,
    Cancelled,
    Internal,
}

impl EngineError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::EmptyPath | Self::Config(_) => FailureKind::InvalidInput,
            Self::RootUnreadable { .. } => FailureKind::PathAccess,
            Self::Spawn(_) | Self::WorkerExited(_) => FailureKind::WorkerFailure,
            Self::Failed(failure) => failure.kind,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Io(_) | Self::Json(_) | Self::Csv(_) => FailureKind::Internal,
        }
    }
}

/// Job-level error payload carried by `error` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub message: String,
    pub kind: FailureKind,
}

impl ScanFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl std::fmt::Display for ScanFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<&EngineError> for ScanFailure {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::Failed(failure) => failure.clone(),
            other => Self::new(other.kind(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_unreadable_maps_to_path_access() {
        let err = EngineError::RootUnreadable {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(err.kind(), FailureKind::PathAccess);
        let failure = ScanFailure::from(&err);
        assert_eq!(failure.kind, FailureKind::PathAccess);
        assert!(failure.message.contains("/nope"));
    }

    #[test]
    fn relayed_failure_keeps_its_kind() {
        let err = EngineError::Failed(ScanFailure::new(FailureKind::WorkerFailure, "boom"));
        assert_eq!(err.kind(), FailureKind::WorkerFailure);
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn failure_serialises_with_snake_case_kind() {
        let failure = ScanFailure::new(FailureKind::InvalidInput, "path is required");
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["kind"], "invalid_input");
        assert_eq!(json["message"], "path is required");
    }
}
