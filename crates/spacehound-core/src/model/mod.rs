/// Data model shared by the workers and their coordinators.
///
/// Every value here is plain owned data: workers build it, send it across
/// a channel and never touch it again.
pub mod duplicate_group;
pub mod scan_node;
pub mod size;

pub use duplicate_group::DuplicateGroup;
pub use scan_node::{CategoryTotals, ChildEntry, EntryKind, ScanNode};
