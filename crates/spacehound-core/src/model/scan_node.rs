/// One node of the size/category-aggregated directory tree.
///
/// A node's `size` always covers every descendant that was read, even
/// though `children` only lists the subdirectories big enough to be worth
/// drawing. `categories` partitions the same bytes, so its total equals
/// `size`.
use crate::analysis::FileCategory;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Bytes per file category. All eight keys are always serialised.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CategoryTotals {
    pub images: u64,
    pub video: u64,
    pub audio: u64,
    pub archives: u64,
    pub documents: u64,
    pub code: u64,
    pub executables: u64,
    pub other: u64,
}

impl CategoryTotals {
    fn slot(&mut self, category: FileCategory) -> &mut u64 {
        match category {
            FileCategory::Images => &mut self.images,
            FileCategory::Video => &mut self.video,
            FileCategory::Audio => &mut self.audio,
            FileCategory::Archives => &mut self.archives,
            FileCategory::Documents => &mut self.documents,
            FileCategory::Code => &mut self.code,
            FileCategory::Executables => &mut self.executables,
            FileCategory::Other => &mut self.other,
        }
    }

    pub fn add(&mut self, category: FileCategory, bytes: u64) {
        *self.slot(category) += bytes;
    }

    pub fn get(&self, category: FileCategory) -> u64 {
        match category {
            FileCategory::Images => self.images,
            FileCategory::Video => self.video,
            FileCategory::Audio => self.audio,
            FileCategory::Archives => self.archives,
            FileCategory::Documents => self.documents,
            FileCategory::Code => self.code,
            FileCategory::Executables => self.executables,
            FileCategory::Other => self.other,
        }
    }

    pub fn merge(&mut self, other: &CategoryTotals) {
        for category in FileCategory::ALL {
            self.add(category, other.get(category));
        }
    }

    pub fn total(&self) -> u64 {
        FileCategory::ALL.iter().map(|&c| self.get(c)).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Directory,
}

/// Pruned descriptor of a large subdirectory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildEntry {
    pub name: CompactString,
    pub path: PathBuf,
    pub size: u64,
    /// Same as `size`; chart widgets read this key.
    pub value: u64,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanNode {
    pub path: PathBuf,
    pub name: CompactString,
    pub size: u64,
    #[serde(rename = "files")]
    pub file_count: u64,
    #[serde(rename = "folders")]
    pub folder_count: u64,
    pub categories: CategoryTotals,
    /// Subdirectories above the visibility threshold, largest first.
    pub children: Vec<ChildEntry>,
}

impl ScanNode {
    /// A zero-valued node for `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            name: display_name(path),
            size: 0,
            file_count: 0,
            folder_count: 0,
            categories: CategoryTotals::default(),
            children: Vec::new(),
        }
    }

    pub fn add_file(&mut self, category: FileCategory, bytes: u64) {
        self.size += bytes;
        self.file_count += 1;
        self.categories.add(category, bytes);
    }

    /// Fold a finished subdirectory into this node.
    ///
    /// The subdirectory always counts towards the aggregates; it is listed in
    /// `children` only when its size is strictly above `threshold`.
    /// Returns whether a child descriptor was appended.
    pub fn absorb(&mut self, child: &ScanNode, threshold: u64) -> bool {
        self.size += child.size;
        self.file_count += child.file_count;
        self.folder_count += 1 + child.folder_count;
        self.categories.merge(&child.categories);

        if child.size > threshold {
            self.children.push(ChildEntry {
                name: child.name.clone(),
                path: child.path.clone(),
                size: child.size,
                value: child.size,
                kind: EntryKind::Directory,
            });
            true
        } else {
            false
        }
    }

    /// Sort `children` largest first. The sort is stable, so equal sizes keep
    /// traversal order.
    pub fn sort_children(&mut self) {
        self.children.sort_by(|a, b| b.size.cmp(&a.size));
    }
}

/// Display name for a node: the final path component, or the trimmed path
/// itself for roots such as `C:\` or `/`.
fn display_name(path: &Path) -> CompactString {
    match path.file_name() {
        Some(name) => CompactString::new(name.to_string_lossy()),
        None => {
            let s = path.to_string_lossy();
            let trimmed = s.trim_end_matches(['\\', '/']);
            if trimmed.is_empty() {
                CompactString::new(s)
            } else {
                CompactString::new(trimmed)
            }
        }
    }
}
