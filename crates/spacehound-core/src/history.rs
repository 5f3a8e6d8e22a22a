/// Scan history: a bounded, append-only list of completed-scan snapshots.
///
/// Persisted as `{"snapshots": [...]}`. A missing or blank file opens as an
/// empty history. Once `capacity` is reached the oldest snapshot is evicted.
use crate::error::{EngineError, Result};
use crate::model::ScanNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Totals of one completed scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub timestamp: DateTime<Utc>,
    pub path: PathBuf,
    pub size: u64,
    pub files: u64,
    pub folders: u64,
}

impl ScanSnapshot {
    pub fn from_node(node: &ScanNode) -> Self {
        Self::at(Utc::now(), node)
    }

    pub fn at(timestamp: DateTime<Utc>, node: &ScanNode) -> Self {
        Self {
            timestamp,
            path: node.path.clone(),
            size: node.size,
            files: node.file_count,
            folders: node.folder_count,
        }
    }
}

#[derive(Deserialize)]
struct HistoryFile {
    #[serde(default)]
    snapshots: VecDeque<ScanSnapshot>,
}

#[derive(Serialize)]
struct HistoryFileRef<'a> {
    snapshots: &'a VecDeque<ScanSnapshot>,
}

#[derive(Debug)]
pub struct ScanHistory {
    file: Option<PathBuf>,
    capacity: usize,
    snapshots: VecDeque<ScanSnapshot>,
}

impl ScanHistory {
    /// In-memory history; `save` is a no-op.
    pub fn new(capacity: usize) -> Self {
        Self {
            file: None,
            capacity: capacity.max(1),
            snapshots: VecDeque::new(),
        }
    }

    /// Load the history stored at `file`, or start empty if there is none.
    pub fn open(file: impl Into<PathBuf>, capacity: usize) -> Result<Self> {
        let file = file.into();
        let mut history = Self::new(capacity);

        match fs::read_to_string(&file) {
            Ok(content) if content.trim().is_empty() => {}
            Ok(content) => {
                let stored: HistoryFile = serde_json::from_str(&content)?;
                history.snapshots = stored.snapshots;
                history.trim();
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(EngineError::Io(e)),
        }

        debug!(
            "Loaded {} history snapshots from {}",
            history.snapshots.len(),
            file.display()
        );
        history.file = Some(file);
        Ok(history)
    }

    pub fn record(&mut self, snapshot: ScanSnapshot) {
        self.snapshots.push_back(snapshot);
        self.trim();
    }

    /// Oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &ScanSnapshot> {
        self.snapshots.iter()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Write the history back to the file it was opened from.
    pub fn save(&self) -> Result<()> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&HistoryFileRef {
            snapshots: &self.snapshots,
        })?;
        fs::write(file, json)?;
        Ok(())
    }

    fn trim(&mut self) {
        while self.snapshots.len() > self.capacity {
            self.snapshots.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot(size: u64) -> ScanSnapshot {
        ScanSnapshot {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            path: PathBuf::from("/data"),
            size,
            files: 3,
            folders: 1,
        }
    }

    #[test]
    fn oldest_snapshots_are_evicted() {
        let mut history = ScanHistory::new(3);
        for size in 0..5 {
            history.record(snapshot(size));
        }
        let sizes: Vec<u64> = history.snapshots().map(|s| s.size).collect();
        assert_eq!(sizes, vec![2, 3, 4]);
    }

    #[test]
    fn save_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("history.json");

        let mut history = ScanHistory::open(&file, 10).unwrap();
        assert!(history.is_empty());
        history.record(snapshot(42));
        history.save().unwrap();

        let raw = fs::read_to_string(&file).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["snapshots"][0]["size"], 42);

        let reopened = ScanHistory::open(&file, 10).unwrap();
        assert_eq!(reopened.snapshots().collect::<Vec<_>>(), vec![&snapshot(42)]);
    }

    #[test]
    fn blank_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history.json");
        fs::write(&file, "  \n").unwrap();
        assert!(ScanHistory::open(&file, 10).unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("history.json");
        fs::write(&file, "{not json").unwrap();
        assert!(matches!(
            ScanHistory::open(&file, 10),
            Err(EngineError::Json(_))
        ));
    }

    #[test]
    fn snapshot_copies_node_totals() {
        let mut node = ScanNode::empty(Path::new("/data"));
        node.size = 100;
        node.file_count = 4;
        node.folder_count = 2;
        let snap = ScanSnapshot::from_node(&node);
        assert_eq!((snap.size, snap.files, snap.folders), (100, 4, 2));
        assert_eq!(snap.path, PathBuf::from("/data"));
    }
}
