/// Coordinators that accept requests and own running jobs.
///
/// Both sit on the same [`registry::JobRegistry`]: one active job per
/// normalised path, later requests for that path join it.
pub mod duplicates;
pub mod registry;
pub mod scan;

pub use duplicates::{DuplicateRequestHandler, DuplicateTicket};
pub use registry::{Admission, JobEvent, JobRegistry, Spawner};
pub use scan::{ScanOrchestrator, ScanTicket};
