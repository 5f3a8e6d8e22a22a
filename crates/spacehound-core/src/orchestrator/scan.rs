/// Scan orchestrator: the entry point for directory aggregation.
///
/// Validates and normalises the requested path, then hands it to the
/// registry, so that at most one aggregation runs per path. Completed scans
/// can optionally be appended to a [`ScanHistory`].
use crate::config::{AggregatorConfig, EngineConfig};
use crate::error::{EngineError, Result};
use crate::history::{ScanHistory, ScanSnapshot};
use crate::model::ScanNode;
use crate::orchestrator::registry::{Admission, JobEvent, JobRegistry, Spawner, TerminalHook};
use crate::platform::normalize_scan_path;
use crate::scanner;
use crate::scanner::progress::{JobState, ScanEvent, ScanRequest};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Handle returned by [`ScanOrchestrator::start_scan`].
#[derive(Debug)]
pub struct ScanTicket {
    /// Normalised path the job is registered under.
    pub path: PathBuf,
    pub admission: Admission,
    /// Every event of the job in emission order; the terminal event is last.
    pub events: Receiver<ScanEvent>,
}

impl ScanTicket {
    /// `false` when this request joined a job that was already running.
    pub fn is_new(&self) -> bool {
        self.admission == Admission::Started
    }

    /// Block until the job ends, discarding progress.
    pub fn wait(self) -> Result<ScanNode> {
        wait_for_node(&self.events)
    }
}

fn wait_for_node(events: &Receiver<ScanEvent>) -> Result<ScanNode> {
    for event in events.iter() {
        match event {
            ScanEvent::Progress { .. } => continue,
            ScanEvent::Complete(node) => return Ok(node),
            ScanEvent::Error(failure) => return Err(EngineError::Failed(failure)),
            ScanEvent::Cancelled => return Err(EngineError::Cancelled),
        }
    }
    Err(EngineError::WorkerExited("scan ended without a result".to_string()))
}

pub struct ScanOrchestrator {
    default_depth: usize,
    registry: JobRegistry<ScanRequest, ScanEvent>,
}

impl ScanOrchestrator {
    /// Fails with [`EngineError::Config`] if `config` does not validate.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(&config.aggregator, default_spawner(&config.aggregator), None))
    }

    /// Record a snapshot of every completed scan into `history`, saving it
    /// after each one.
    pub fn with_history(
        config: &EngineConfig,
        history: Arc<Mutex<ScanHistory>>,
    ) -> Result<Self> {
        config.validate()?;
        let hook: TerminalHook<ScanEvent> = Arc::new(move |_path: &Path, event: &ScanEvent| {
            if let ScanEvent::Complete(node) = event {
                let mut history = history.lock();
                history.record(ScanSnapshot::from_node(node));
                if let Err(e) = history.save() {
                    warn!("Failed to save scan history: {e}");
                }
            }
        });
        Ok(Self::build(
            &config.aggregator,
            default_spawner(&config.aggregator),
            Some(hook),
        ))
    }

    /// Use a custom worker factory instead of the directory aggregator.
    pub fn with_spawner(
        config: &EngineConfig,
        spawner: Spawner<ScanRequest, ScanEvent>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(&config.aggregator, spawner, None))
    }

    fn build(
        config: &AggregatorConfig,
        spawner: Spawner<ScanRequest, ScanEvent>,
        hook: Option<TerminalHook<ScanEvent>>,
    ) -> Self {
        fn relay_all(_: &ScanEvent) -> bool {
            true
        }
        Self {
            default_depth: config.max_depth,
            registry: JobRegistry::build("scan", spawner, relay_all, hook),
        }
    }

    /// Start aggregating `raw_path`, or join the aggregation already running
    /// for it. A joined job keeps the depth it was started with.
    ///
    /// An empty path is rejected before anything is spawned.
    pub fn start_scan(&self, raw_path: &str, max_depth: Option<usize>) -> Result<ScanTicket> {
        let path = normalize_scan_path(raw_path)?;
        let request = ScanRequest {
            path: path.clone(),
            max_depth: max_depth.unwrap_or(self.default_depth),
        };
        let (admission, events) = self.registry.submit(path.clone(), request)?;
        Ok(ScanTicket {
            path,
            admission,
            events,
        })
    }

    pub fn cancel(&self, raw_path: &str) -> bool {
        normalize_scan_path(raw_path).is_ok_and(|path| self.registry.cancel(&path))
    }

    pub fn terminate(&self, raw_path: &str) -> bool {
        normalize_scan_path(raw_path).is_ok_and(|path| self.registry.terminate(&path))
    }

    pub fn is_running(&self, raw_path: &str) -> bool {
        normalize_scan_path(raw_path).is_ok_and(|path| self.registry.is_running(&path))
    }

    pub fn state(&self, raw_path: &str) -> JobState {
        normalize_scan_path(raw_path)
            .map(|path| self.registry.state(&path))
            .unwrap_or(JobState::Idle)
    }

    pub fn active_scans(&self) -> Vec<PathBuf> {
        self.registry.active_jobs()
    }

    pub fn listen(&self) -> Receiver<JobEvent<ScanEvent>> {
        self.registry.listen()
    }
}

fn default_spawner(config: &AggregatorConfig) -> Spawner<ScanRequest, ScanEvent> {
    let config = config.clone();
    Arc::new(move |request| scanner::start_scan(request, config.clone()))
}
