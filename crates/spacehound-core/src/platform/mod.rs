/// Platform-facing helpers: request path handling.
pub mod paths;

pub use paths::{is_excluded, normalize_scan_path};
