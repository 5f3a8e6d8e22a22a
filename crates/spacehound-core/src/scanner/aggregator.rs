/// Directory aggregator: a depth-bounded recursive walk that folds sizes,
/// counts and category totals bottom-up into a [`ScanNode`].
///
/// Sibling subdirectories are aggregated in parallel on a rayon pool owned
/// by the job. Results are merged back in traversal order, so the pruned
/// `children` list (and its size ties) does not depend on scheduling.
///
/// # Depth limit
///
/// The root is depth 0. A subdirectory at `depth + 1 > max_depth` is not
/// entered and contributes nothing at all, not even to `folders`, so the
/// bytes below the limit are missing from every ancestor's totals. Known gap,
/// see DESIGN.md before changing it.
use crate::analysis::categorise_path;
use crate::config::AggregatorConfig;
use crate::error::{EngineError, Result, ScanFailure};
use crate::model::ScanNode;
use crate::platform::is_excluded;
use crate::scanner::progress::{ScanEvent, ScanRequest};
use crate::scanner::worker::CancelToken;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Worker entry point: run one aggregation and map its outcome to the
/// terminal event.
pub fn run_aggregation(
    request: ScanRequest,
    config: &AggregatorConfig,
    events: &Sender<ScanEvent>,
    cancel: &CancelToken,
) -> ScanEvent {
    match aggregate(&request.path, request.max_depth, config, events, cancel) {
        Ok(node) => ScanEvent::Complete(node),
        Err(EngineError::Cancelled) => ScanEvent::Cancelled,
        Err(err) => ScanEvent::Error(ScanFailure::from(&err)),
    }
}

/// Aggregate the tree under `root`.
///
/// Sends a `progress` event each time an immediate child of `root` finishes.
/// Fails only if `root` itself cannot be listed or the job is cancelled;
/// every other unreadable entry is skipped.
pub fn aggregate(
    root: &Path,
    max_depth: usize,
    config: &AggregatorConfig,
    events: &Sender<ScanEvent>,
    cancel: &CancelToken,
) -> Result<ScanNode> {
    let start = Instant::now();
    let entries = fs::read_dir(root).map_err(|source| EngineError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("spacehound-aggregate-{i}"))
        .build()
        .map_err(|e| EngineError::Spawn(std::io::Error::other(e)))?;

    let walker = Walker {
        max_depth,
        threshold: config.visibility_threshold,
        excludes: &config.exclude_paths,
        events,
        cancel,
    };
    let node = pool.install(|| walker.scan_entries(root, entries, 0))?;

    info!(
        "Aggregated {} ({} files, {} folders, {} bytes) in {:?}",
        root.display(),
        node.file_count,
        node.folder_count,
        node.size,
        start.elapsed()
    );
    Ok(node)
}

struct Walker<'a> {
    max_depth: usize,
    threshold: u64,
    excludes: &'a [String],
    events: &'a Sender<ScanEvent>,
    cancel: &'a CancelToken,
}

impl Walker<'_> {
    /// `Ok(None)` means the directory could not be listed and contributes nothing.
    fn scan_dir(&self, path: &Path, depth: usize) -> Result<Option<ScanNode>> {
        match fs::read_dir(path) {
            Ok(entries) => self.scan_entries(path, entries, depth).map(Some),
            Err(err) => {
                debug!("Skipping unreadable directory {}: {err}", path.display());
                Ok(None)
            }
        }
    }

    fn scan_entries(&self, path: &Path, entries: fs::ReadDir, depth: usize) -> Result<ScanNode> {
        if self.cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let mut node = ScanNode::empty(path);
        let mut subdirs: Vec<PathBuf> = Vec::new();

        for entry in entries {
            let Ok(entry) = entry else { continue };
            let entry_path = entry.path();
            if is_excluded(&entry_path, self.excludes) {
                trace!("Excluded {}", entry_path.display());
                continue;
            }
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                if depth < self.max_depth {
                    subdirs.push(entry_path);
                }
                continue;
            }

            match fs::symlink_metadata(&entry_path) {
                Ok(meta) => node.add_file(categorise_path(&entry_path), meta.len()),
                Err(err) => trace!("Skipping unreadable file {}: {err}", entry_path.display()),
            }
        }

        // Directory listing order is filesystem-defined; fix it so merges
        // and size ties are reproducible.
        subdirs.sort();

        let results: Vec<Result<Option<ScanNode>>> = subdirs
            .par_iter()
            .map(|dir| self.scan_dir(dir, depth + 1))
            .collect();

        for result in results {
            if let Some(child) = result? {
                node.absorb(&child, self.threshold);
            }
        }
        node.sort_children();

        if depth == 1 {
            let _ = self.events.send(ScanEvent::Progress {
                path: node.path.clone(),
                size: node.size,
            });
        }
        Ok(node)
    }
}
