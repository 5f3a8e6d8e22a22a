/// Messages exchanged between coordinators and workers.
///
/// Requests travel inward inside [`WorkerCommand::Start`]; events travel
/// outward over a crossbeam channel. A worker sends any number of
/// non-terminal events followed by exactly one terminal event.
use crate::error::{FailureKind, ScanFailure};
use crate::model::{DuplicateGroup, ScanNode};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Commands sent from a coordinator to a worker thread.
#[derive(Debug)]
pub enum WorkerCommand<Req> {
    /// Begin the job. Workers run exactly one job.
    Start(Req),
    /// Exit without running.
    Shutdown,
}

/// Aggregator request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub path: PathBuf,
    pub max_depth: usize,
}

/// Duplicate-detector request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRequest {
    pub path: PathBuf,
}

/// Lifecycle of one job: `Idle → Running → {Completed, Failed, Cancelled}`.
///
/// All three end states are terminal; jobs are never paused or restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Behaviour the coordinators need from any worker event type.
pub trait WorkerEvent: Clone + Send + 'static {
    /// The end state this event puts its job in, or `None` for progress.
    fn terminal_state(&self) -> Option<JobState>;

    /// `complete`, `error` and `cancelled` end a job; nothing follows them.
    fn is_terminal(&self) -> bool {
        self.terminal_state().is_some()
    }

    /// Terminal event reporting a job-level failure.
    fn failed(failure: ScanFailure) -> Self;

    /// Terminal event reporting cancellation.
    fn cancelled() -> Self;

    /// The worker thread died without a terminal event.
    fn worker_exited(detail: &str) -> Self {
        Self::failed(ScanFailure::new(
            FailureKind::WorkerFailure,
            format!("worker exited unexpectedly: {detail}"),
        ))
    }
}

/// Events produced by the directory aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanEvent {
    /// One immediate child of the scan root has been fully aggregated.
    Progress { path: PathBuf, size: u64 },
    Complete(ScanNode),
    Error(ScanFailure),
    Cancelled,
}

impl WorkerEvent for ScanEvent {
    fn terminal_state(&self) -> Option<JobState> {
        match self {
            Self::Progress { .. } => None,
            Self::Complete(_) => Some(JobState::Completed),
            Self::Error(_) => Some(JobState::Failed),
            Self::Cancelled => Some(JobState::Cancelled),
        }
    }

    fn failed(failure: ScanFailure) -> Self {
        Self::Error(failure)
    }

    fn cancelled() -> Self {
        Self::Cancelled
    }
}

/// Events produced by the duplicate detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateEvent {
    /// Free-form phase/status text.
    Status { message: String },
    /// Percentage of candidate size groups hashed so far.
    Progress { percent: u8 },
    #[serde(rename = "duplicateGroups")]
    Complete(Vec<DuplicateGroup>),
    Error(ScanFailure),
    Cancelled,
}

impl WorkerEvent for DuplicateEvent {
    fn terminal_state(&self) -> Option<JobState> {
        match self {
            Self::Status { .. } | Self::Progress { .. } => None,
            Self::Complete(_) => Some(JobState::Completed),
            Self::Error(_) => Some(JobState::Failed),
            Self::Cancelled => Some(JobState::Cancelled),
        }
    }

    fn failed(failure: ScanFailure) -> Self {
        Self::Error(failure)
    }

    fn cancelled() -> Self {
        Self::Cancelled
    }
}
