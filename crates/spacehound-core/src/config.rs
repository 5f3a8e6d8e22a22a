/// Engine configuration.
///
/// Every field has a default matching the built-in constants, so an empty
/// JSON object (or no file at all) yields the stock behaviour. Individual
/// requests may still override `max_depth`.
use crate::error::{EngineError, Result};
use crate::model::size::{KIB, MIB};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default recursion limit for the directory aggregator.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Subdirectories must be strictly larger than this to appear in `children`.
pub const TREE_VISIBILITY_THRESHOLD: u64 = 10 * MIB;

/// Files below this size are never considered by the duplicate detector.
pub const DUPLICATE_MIN_FILE_SIZE: u64 = MIB;

/// Number of leading bytes fingerprinted by the partial-hash pass.
pub const PARTIAL_HASH_BYTES: usize = KIB as usize;

/// Maximum snapshots retained by the scan history.
pub const HISTORY_CAPACITY: usize = 2_000;

/// Path substrings skipped by the aggregator.
pub const AGGREGATOR_EXCLUDES: &[&str] = &[
    "$Recycle.Bin",
    "System Volume Information",
    "Config.Msi",
    "Windows/System32/LogFiles",
    "Recovery",
];

/// Entry names skipped by the duplicate detector at any depth.
pub const DUPLICATE_EXCLUDES: &[&str] = &["$Recycle.Bin", "System Volume Information", "Windows"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aggregator: AggregatorConfig,
    pub duplicates: DuplicateConfig,
    pub history: HistoryConfig,
}

impl EngineConfig {
    /// Load a configuration from a JSON file. Missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregator.threads == 0 || self.duplicates.threads == 0 {
            return Err(EngineError::Config("thread counts must be > 0".into()));
        }
        if self.duplicates.partial_hash_bytes == 0 {
            return Err(EngineError::Config(
                "duplicates.partial_hash_bytes must be > 0".into(),
            ));
        }
        if self.duplicates.status_interval == 0 || self.duplicates.progress_interval == 0 {
            return Err(EngineError::Config(
                "duplicates progress intervals must be > 0".into(),
            ));
        }
        if self.history.capacity == 0 {
            return Err(EngineError::Config("history.capacity must be > 0".into()));
        }
        Ok(())
    }
}

/// Settings for the depth-bounded directory aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub max_depth: usize,
    pub visibility_threshold: u64,
    /// Case-sensitive substrings; any entry whose full path contains one is skipped.
    pub exclude_paths: Vec<String>,
    /// Size of the per-job rayon pool.
    pub threads: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            visibility_threshold: TREE_VISIBILITY_THRESHOLD,
            exclude_paths: AGGREGATOR_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            threads: num_cpus::get(),
        }
    }
}

/// Settings for the unbounded-depth duplicate detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicateConfig {
    pub min_file_size: u64,
    pub partial_hash_bytes: usize,
    /// Exact entry names (files or directories) skipped at any depth.
    pub exclude_names: Vec<String>,
    /// Emit a `status` event every N files visited.
    pub status_interval: u64,
    /// Emit a `progress` event every N candidate groups hashed.
    pub progress_interval: usize,
    /// Size of the per-job rayon pool used for walking and hashing.
    pub threads: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            min_file_size: DUPLICATE_MIN_FILE_SIZE,
            partial_hash_bytes: PARTIAL_HASH_BYTES,
            exclude_names: DUPLICATE_EXCLUDES.iter().map(|s| s.to_string()).collect(),
            status_interval: 500,
            progress_interval: 10,
            threads: num_cpus::get(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub capacity: usize,
    /// Where snapshots are persisted; `None` keeps them in memory only.
    pub path: Option<PathBuf>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: HISTORY_CAPACITY,
            path: None,
        }
    }
}
