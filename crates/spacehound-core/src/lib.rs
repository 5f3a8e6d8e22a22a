/// SpaceHound Core: background disk-usage aggregation and duplicate-file
/// detection.
///
/// Long filesystem jobs run on isolated worker threads and stream typed
/// events back to the coordinator that started them. Nothing in this crate
/// touches a terminal or a UI; the `spacehound` binary is one frontend.
///
/// # Modules
///
/// - [`orchestrator`]: request entry points with per-path admission control.
/// - [`scanner`]: the aggregation and duplicate-detection workers.
/// - [`model`]: `ScanNode`, `DuplicateGroup` and size helpers.
/// - [`analysis`]: extension-based file categorisation.
/// - [`platform`]: path normalisation and exclusion matching.
/// - [`config`], [`error`], [`history`], [`export`]: supporting plumbing.
pub mod analysis;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod model;
pub mod orchestrator;
pub mod platform;
pub mod scanner;

pub use config::EngineConfig;
pub use error::{EngineError, FailureKind, Result, ScanFailure};
