/// Duplicate request handler.
///
/// By default only the terminal reply (`duplicateGroups`, `error` or
/// `cancelled`) reaches the caller; the worker's `status` and `progress`
/// events stay internal unless forwarding is switched on. Requests for a
/// path already being analysed join the running job.
use crate::config::{DuplicateConfig, EngineConfig};
use crate::error::{EngineError, Result};
use crate::model::DuplicateGroup;
use crate::orchestrator::registry::{Admission, JobEvent, JobRegistry, Spawner};
use crate::platform::normalize_scan_path;
use crate::scanner;
use crate::scanner::progress::{DuplicateEvent, DuplicateRequest, JobState};
use crossbeam_channel::Receiver;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct DuplicateTicket {
    pub path: PathBuf,
    pub admission: Admission,
    pub events: Receiver<DuplicateEvent>,
}

impl DuplicateTicket {
    pub fn is_new(&self) -> bool {
        self.admission == Admission::Started
    }

    /// Block until the reply arrives.
    pub fn wait(self) -> Result<Vec<DuplicateGroup>> {
        for event in self.events.iter() {
            match event {
                DuplicateEvent::Status { .. } | DuplicateEvent::Progress { .. } => continue,
                DuplicateEvent::Complete(groups) => return Ok(groups),
                DuplicateEvent::Error(failure) => return Err(EngineError::Failed(failure)),
                DuplicateEvent::Cancelled => return Err(EngineError::Cancelled),
            }
        }
        Err(EngineError::WorkerExited(
            "duplicate detection ended without a result".to_string(),
        ))
    }
}

fn terminal_only(_: &DuplicateEvent) -> bool {
    false
}

fn everything(_: &DuplicateEvent) -> bool {
    true
}

pub struct DuplicateRequestHandler {
    registry: JobRegistry<DuplicateRequest, DuplicateEvent>,
}

impl DuplicateRequestHandler {
    /// Fails with [`EngineError::Config`] if `config` does not validate, so a
    /// bad interval or thread count never reaches a worker.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        Self::with_progress_forwarding(config, false)
    }

    /// Also forward `status` and `progress` events to callers.
    pub fn with_progress_forwarding(config: &EngineConfig, forward: bool) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_spawner(default_spawner(&config.duplicates), forward))
    }

    pub fn with_spawner(
        spawner: Spawner<DuplicateRequest, DuplicateEvent>,
        forward_progress: bool,
    ) -> Self {
        let filter: fn(&DuplicateEvent) -> bool = if forward_progress {
            everything
        } else {
            terminal_only
        };
        Self {
            registry: JobRegistry::build("duplicates", spawner, filter, None),
        }
    }

    /// Search `raw_path` for duplicate files, or join the search already
    /// running there.
    pub fn find_duplicates(&self, raw_path: &str) -> Result<DuplicateTicket> {
        let path = normalize_scan_path(raw_path)?;
        let request = DuplicateRequest { path: path.clone() };
        let (admission, events) = self.registry.submit(path.clone(), request)?;
        Ok(DuplicateTicket {
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

    pub fn listen(&self) -> Receiver<JobEvent<DuplicateEvent>> {
        self.registry.listen()
    }
}

fn default_spawner(config: &DuplicateConfig) -> Spawner<DuplicateRequest, DuplicateEvent> {
    let config = config.clone();
    Arc::new(move |request| scanner::start_duplicate_scan(request, config.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureKind;
    use std::fs;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.duplicates.min_file_size = 16;
        config.duplicates.partial_hash_bytes = 8;
        config.duplicates.threads = 2;
        config
    }

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in ["a.bin", "b.bin"] {
            fs::write(dir.path().join(name), vec![7u8; 64]).unwrap();
        }
        dir
    }

    #[test]
    fn only_the_reply_crosses_by_default() {
        let dir = tree();
        let handler = DuplicateRequestHandler::new(&config()).unwrap();
        let ticket = handler
            .find_duplicates(&dir.path().to_string_lossy())
            .unwrap();
        let events: Vec<DuplicateEvent> = ticket.events.iter().collect();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DuplicateEvent::Complete(groups) => assert_eq!(groups[0].files.len(), 2),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn forwarding_exposes_status_events() {
        let dir = tree();
        let handler =
            DuplicateRequestHandler::with_progress_forwarding(&config(), true).unwrap();
        let ticket = handler
            .find_duplicates(&dir.path().to_string_lossy())
            .unwrap();
        let events: Vec<DuplicateEvent> = ticket.events.iter().collect();
        assert!(matches!(events.first(), Some(DuplicateEvent::Status { .. })));
        assert!(matches!(events.last(), Some(DuplicateEvent::Complete(_))));
    }

    #[test]
    fn empty_path_is_rejected() {
        let handler = DuplicateRequestHandler::new(&config()).unwrap();
        let err = handler.find_duplicates("").unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
    }

    #[test]
    fn zero_intervals_are_rejected_before_any_worker_runs() {
        let mut bad = config();
        bad.duplicates.progress_interval = 0;
        match DuplicateRequestHandler::new(&bad) {
            Err(err) => assert_eq!(err.kind(), FailureKind::InvalidInput),
            Ok(_) => panic!("a zero progress interval must not be accepted"),
        }

        let mut bad = config();
        bad.duplicates.status_interval = 0;
        assert!(matches!(
            DuplicateRequestHandler::with_progress_forwarding(&bad, true),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn bad_root_replies_with_error() {
        let dir = tempfile::tempdir().unwrap();
        let handler = DuplicateRequestHandler::new(&config()).unwrap();
        let ticket = handler
            .find_duplicates(&dir.path().join("missing").to_string_lossy())
            .unwrap();
        assert!(matches!(ticket.wait(), Err(EngineError::Failed(_))));
    }
}
