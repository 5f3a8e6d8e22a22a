/// A confirmed set of byte-identical files.
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Lower-case hex BLAKE3 digest of the full content.
    pub hash: String,
    /// Size in bytes of every member.
    pub size: u64,
    /// Members in traversal order. Always at least two entries.
    pub files: Vec<PathBuf>,
}

impl DuplicateGroup {
    /// Bytes that would be freed by keeping a single copy.
    pub fn wasted_bytes(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }

    /// The suggested keep-copy. This is only the first member found; it says
    /// nothing about age or provenance.
    pub fn keep_candidate(&self) -> Option<&Path> {
        self.files.first().map(PathBuf::as_path)
    }
}
