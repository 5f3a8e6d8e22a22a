/// Scanner module: the two background workers and the thread/channel
/// plumbing they run on.
///
/// - [`aggregator`]: depth-bounded size/category aggregation.
/// - [`duplicates`]: unbounded walk plus size → partial hash → full hash.
/// - [`worker`]: one named thread per job, command channel in, event channel out.
/// - [`progress`]: requests and the typed events workers emit.
pub mod aggregator;
pub mod duplicates;
pub mod hashing;
pub mod progress;
pub mod worker;

use crate::config::{AggregatorConfig, DuplicateConfig};
use crate::error::Result;
use progress::{DuplicateEvent, DuplicateRequest, ScanEvent, ScanRequest};
use tracing::info;
use worker::{spawn_worker, WorkerHandle};

/// Maximum number of events that may queue between a worker and its relay.
///
/// When the relay falls behind, the worker blocks on `send` rather than
/// growing the heap without bound.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

pub type ScanWorker = WorkerHandle<ScanRequest, ScanEvent>;
pub type DuplicateWorker = WorkerHandle<DuplicateRequest, DuplicateEvent>;

/// Start a directory aggregation on its own worker thread.
pub fn start_scan(request: ScanRequest, config: AggregatorConfig) -> Result<ScanWorker> {
    info!(
        "Starting aggregation of {} (max depth {})",
        request.path.display(),
        request.max_depth
    );
    let handle = spawn_worker("spacehound-scanner", move |request: ScanRequest, events, cancel| {
        aggregator::run_aggregation(request, &config, events, cancel)
    })?;
    handle.start(request)?;
    Ok(handle)
}

/// Start a duplicate detection run on its own worker thread.
pub fn start_duplicate_scan(
    request: DuplicateRequest,
    config: DuplicateConfig,
) -> Result<DuplicateWorker> {
    info!("Starting duplicate detection under {}", request.path.display());
    let handle = spawn_worker(
        "spacehound-duplicates",
        move |request: DuplicateRequest, events, cancel| {
            duplicates::run_detection(request, &config, events, cancel)
        },
    )?;
    handle.start(request)?;
    Ok(handle)
}
