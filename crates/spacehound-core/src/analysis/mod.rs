/// Analysis helpers used by the workers.
pub mod file_types;

pub use file_types::{categorise_extension, categorise_path, FileCategory};
