/// Duplicate detector: an unbounded-depth walk followed by a
/// size → partial-hash → full-hash pipeline.
///
/// 1. **Collect** every file of at least `min_file_size` bytes, keyed by size.
/// 2. **Candidate filter**: drop sizes seen only once.
/// 3. **Partial hash** the first `partial_hash_bytes` of each candidate and
///    drop fingerprints seen only once.
/// 4. **Full hash** the survivors; every full hash shared by two or more
///    files becomes a [`DuplicateGroup`].
///
/// An I/O error on one file removes only that file. Group members keep
/// traversal order, which is sorted per directory here but must not be read
/// as an age or "original copy" ranking.
use crate::config::DuplicateConfig;
use crate::error::{EngineError, Result, ScanFailure};
use crate::model::size::{format_count, format_size};
use crate::model::DuplicateGroup;
use crate::scanner::hashing::{full_hash, partial_hash};
use crate::scanner::progress::{DuplicateEvent, DuplicateRequest};
use crate::scanner::worker::CancelToken;
use crossbeam_channel::Sender;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, trace};

/// Files sharing one exact byte size.
type SizeBucket = (u64, Vec<PathBuf>);

/// Worker entry point.
pub fn run_detection(
    request: DuplicateRequest,
    config: &DuplicateConfig,
    events: &Sender<DuplicateEvent>,
    cancel: &CancelToken,
) -> DuplicateEvent {
    match find_duplicates(&request.path, config, events, cancel) {
        Ok(groups) => DuplicateEvent::Complete(groups),
        Err(EngineError::Cancelled) => DuplicateEvent::Cancelled,
        Err(err) => DuplicateEvent::Error(ScanFailure::from(&err)),
    }
}

pub fn find_duplicates(
    root: &Path,
    config: &DuplicateConfig,
    events: &Sender<DuplicateEvent>,
    cancel: &CancelToken,
) -> Result<Vec<DuplicateGroup>> {
    let start = Instant::now();
    fs::read_dir(root).map_err(|source| EngineError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;

    status(
        events,
        format!(
            "Scanning {} for files >= {}...",
            root.display(),
            format_size(config.min_file_size)
        ),
    );
    let by_size = collect_by_size(root, config, events, cancel)?;
    let candidates = candidate_buckets(by_size);
    status(
        events,
        format!("Analyzing {} candidate groups...", format_count(candidates.len() as u64)),
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .thread_name(|i| format!("spacehound-hash-{i}"))
        .build()
        .map_err(|e| EngineError::Spawn(io::Error::other(e)))?;

    let total = candidates.len();
    let mut groups = Vec::new();
    for (processed, (size, files)) in candidates.into_iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        pool.install(|| {
            for partial in split_by_partial_hash(files, config.partial_hash_bytes) {
                groups.extend(confirm_by_full_hash(size, partial));
            }
        });

        let processed = processed + 1;
        if processed % config.progress_interval == 0 {
            let _ = events.send(DuplicateEvent::Progress {
                percent: percent(processed, total),
            });
        }
    }

    info!(
        "Found {} duplicate groups under {} in {:?}",
        groups.len(),
        root.display(),
        start.elapsed()
    );
    Ok(groups)
}

/// Phase 1: walk everything below `root`, skipping excluded names, and bucket
/// large-enough files by exact size.
fn collect_by_size(
    root: &Path,
    config: &DuplicateConfig,
    events: &Sender<DuplicateEvent>,
    cancel: &CancelToken,
) -> Result<HashMap<u64, Vec<PathBuf>>> {
    let excludes = config.exclude_names.clone();
    let walk_cancel = cancel.clone();

    let walker = jwalk::WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .parallelism(jwalk::Parallelism::RayonNewPool(config.threads))
        .process_read_dir(move |_depth, _path, _state, children| {
            // Directory boundary: stop descending once cancelled.
            if walk_cancel.is_cancelled() {
                children.clear();
                return;
            }
            children.retain(|child| match child {
                Ok(entry) => !excludes.iter().any(|name| entry.file_name == name.as_str()),
                Err(_) => true,
            });
        });

    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    let mut visited: u64 = 0;

    for entry_result in walker {
        let entry = match entry_result {
            Ok(e) => e,
            Err(err) => {
                trace!("Skipping unreadable entry: {err}");
                continue;
            }
        };
        let file_type = entry.file_type();
        if file_type.is_dir() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        visited += 1;
        if visited % config.status_interval == 0 {
            status(events, format!("Scanned {} files...", format_count(visited)));
        }

        let path = entry.path();
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.len() >= config.min_file_size => {
                by_size.entry(meta.len()).or_default().push(path);
            }
            Ok(_) => {}
            Err(err) => trace!("Skipping unreadable file {}: {err}", path.display()),
        }
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    debug!("Collected {visited} files into {} size buckets", by_size.len());
    Ok(by_size)
}

/// Phase 2: a file with a unique size cannot have a duplicate.
///
/// Buckets come back largest size first, so the most reclaimable groups are
/// hashed (and reported) first.
fn candidate_buckets(by_size: HashMap<u64, Vec<PathBuf>>) -> Vec<SizeBucket> {
    let mut candidates: Vec<SizeBucket> = by_size
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .collect();
    candidates.sort_unstable_by(|a, b| b.0.cmp(&a.0));
    candidates
}

/// Phase 3: sub-groups of one size bucket that share a prefix fingerprint.
fn split_by_partial_hash(files: Vec<PathBuf>, prefix_len: usize) -> Vec<Vec<PathBuf>> {
    bucket_by(files, |path| partial_hash(path, prefix_len))
        .into_iter()
        .map(|(_, members)| members)
        .filter(|members| members.len() > 1)
        .collect()
}

/// Phase 4: confirmed groups within one partial-hash sub-group.
fn confirm_by_full_hash(size: u64, files: Vec<PathBuf>) -> Vec<DuplicateGroup> {
    bucket_by(files, full_hash)
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(digest, members)| DuplicateGroup {
            hash: digest.to_hex().to_string(),
            size,
            files: members,
        })
        .collect()
}

/// Compute `key` for every file in parallel and group by it, keeping
/// first-seen key order and the input order within each group. Files whose
/// key cannot be computed are dropped.
fn bucket_by<K, F>(files: Vec<PathBuf>, key: F) -> Vec<(K, Vec<PathBuf>)>
where
    K: Hash + Eq + Clone + Send,
    F: Fn(&Path) -> io::Result<K> + Sync,
{
    let keyed: Vec<(PathBuf, io::Result<K>)> = files
        .into_par_iter()
        .map(|path| {
            let k = key(&path);
            (path, k)
        })
        .collect();

    let mut index: HashMap<K, usize> = HashMap::new();
    let mut buckets: Vec<(K, Vec<PathBuf>)> = Vec::new();
    for (path, k) in keyed {
        match k {
            Ok(k) => match index.get(&k) {
                Some(&i) => buckets[i].1.push(path),
                None => {
                    index.insert(k.clone(), buckets.len());
                    buckets.push((k, vec![path]));
                }
            },
            Err(err) => debug!("Dropping {} from comparison: {err}", path.display()),
        }
    }
    buckets
}

fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed as f64 / total as f64) * 100.0).round() as u8
}

fn status(events: &Sender<DuplicateEvent>, message: String) {
    debug!("{message}");
    let _ = events.send(DuplicateEvent::Status { message });
}
