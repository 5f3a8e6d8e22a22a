/// Per-path admission control shared by every coordinator.
///
/// A [`JobRegistry`] maps a normalised path to at most one running job. A
/// request for a path that is already running joins the existing job: the
/// new subscriber is first replayed every event relayed so far, then
/// receives live events, so all subscribers observe the same stream.
///
/// Each job gets a relay thread that drains the worker's event channel,
/// forwards events to subscribers in emission order and, on the terminal
/// event (or an abnormal worker exit), joins the worker, deregisters the job
/// and delivers the terminal event. Registry bookkeeping and fan-out happen
/// under one lock, so a deregistered job can never pick up a late subscriber.
use crate::error::{EngineError, Result};
use crate::scanner::progress::{JobState, WorkerEvent};
use crate::scanner::worker::{CancelToken, WorkerHandle};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info, warn};

/// Spawns and starts a worker for one request.
pub type Spawner<Req, Ev> = Arc<dyn Fn(Req) -> Result<WorkerHandle<Req, Ev>> + Send + Sync>;

/// Called once per finished job with its terminal event, before subscribers
/// receive it. Runs outside the registry lock.
pub type TerminalHook<Ev> = Arc<dyn Fn(&Path, &Ev) + Send + Sync>;

/// Outcome of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new worker was spawned for this request.
    Started,
    /// A job for the path was already running; the caller joined it.
    AlreadyRunning,
}

/// An event tagged with the job it belongs to, as seen by global listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent<Ev> {
    pub path: PathBuf,
    pub event: Ev,
}

struct JobEntry<Ev> {
    id: u64,
    subscribers: Vec<Sender<Ev>>,
    replay: Vec<Ev>,
    cancel: CancelToken,
}

struct Inner<Ev> {
    jobs: HashMap<PathBuf, JobEntry<Ev>>,
    /// End state of the last job per path. One small entry per distinct path
    /// ever submitted, kept for the registry's lifetime so `state` can answer
    /// after a job is gone; a new submission for the path clears it.
    finished: HashMap<PathBuf, JobState>,
    listeners: Vec<Sender<JobEvent<Ev>>>,
    next_id: u64,
}

struct Shared<Ev> {
    inner: Mutex<Inner<Ev>>,
    relay_filter: fn(&Ev) -> bool,
    hook: Option<TerminalHook<Ev>>,
}

pub struct JobRegistry<Req, Ev> {
    name: &'static str,
    spawner: Spawner<Req, Ev>,
    shared: Arc<Shared<Ev>>,
}

fn relay_everything<Ev>(_: &Ev) -> bool {
    true
}

impl<Req, Ev> JobRegistry<Req, Ev>
where
    Req: Send + 'static,
    Ev: WorkerEvent,
{
    /// `name` prefixes relay thread names and log lines.
    pub fn new(name: &'static str, spawner: Spawner<Req, Ev>) -> Self {
        Self::build(name, spawner, relay_everything::<Ev>, None)
    }

    /// Full constructor.
    ///
    /// `relay_filter` decides which non-terminal events cross to subscribers;
    /// terminal events always do.
    pub fn build(
        name: &'static str,
        spawner: Spawner<Req, Ev>,
        relay_filter: fn(&Ev) -> bool,
        hook: Option<TerminalHook<Ev>>,
    ) -> Self {
        Self {
            name,
            spawner,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    jobs: HashMap::new(),
                    finished: HashMap::new(),
                    listeners: Vec::new(),
                    next_id: 0,
                }),
                relay_filter,
                hook,
            }),
        }
    }

    /// Join the running job for `path`, or spawn one for `request`.
    pub fn submit(&self, path: PathBuf, request: Req) -> Result<(Admission, Receiver<Ev>)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut inner = self.shared.inner.lock();

        if let Some(job) = inner.jobs.get_mut(&path) {
            for event in &job.replay {
                let _ = tx.send(event.clone());
            }
            job.subscribers.push(tx);
            debug!("[{}] {} already running, joined job", self.name, path.display());
            return Ok((Admission::AlreadyRunning, rx));
        }

        let worker = (self.spawner)(request)?;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.jobs.insert(
            path.clone(),
            JobEntry {
                id,
                subscribers: vec![tx],
                replay: Vec::new(),
                cancel: worker.cancel_token(),
            },
        );
        inner.finished.remove(&path);
        drop(inner);

        let shared = Arc::clone(&self.shared);
        let relay_path = path.clone();
        let name = self.name;
        let spawned = thread::Builder::new()
            .name(format!("{name}-relay"))
            .spawn(move || relay(name, &shared, &relay_path, id, worker));

        if let Err(err) = spawned {
            // The worker handle was dropped with the closure, which cancels it.
            self.shared.inner.lock().jobs.remove(&path);
            return Err(EngineError::Spawn(err));
        }

        info!("[{}] started job {id} for {}", self.name, path.display());
        Ok((Admission::Started, rx))
    }

    /// Receive every relayed event of every job from now on.
    pub fn listen(&self) -> Receiver<JobEvent<Ev>> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.shared.inner.lock().listeners.push(tx);
        rx
    }

    /// Ask the running job for `path` to stop at its next directory boundary.
    /// Returns `false` if no job is running there.
    pub fn cancel(&self, path: &Path) -> bool {
        match self.shared.inner.lock().jobs.get(path) {
            Some(job) => {
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Hard stop: deregister the job immediately and tell its subscribers it
    /// was cancelled, without waiting for the worker. Anything the worker
    /// still sends is discarded by its relay.
    pub fn terminate(&self, path: &Path) -> bool {
        let mut inner = self.shared.inner.lock();
        let Some(job) = inner.jobs.remove(path) else {
            return false;
        };
        job.cancel.cancel();
        inner.finished.insert(path.to_path_buf(), JobState::Cancelled);

        let event = Ev::cancelled();
        broadcast(&mut inner.listeners, path, &event);
        for subscriber in &job.subscribers {
            let _ = subscriber.send(event.clone());
        }
        warn!("[{}] job {} for {} terminated", self.name, job.id, path.display());
        true
    }

    pub fn is_running(&self, path: &Path) -> bool {
        self.shared.inner.lock().jobs.contains_key(path)
    }

    /// `Running` for an active job, the end state of the last job otherwise,
    /// or `Idle` if the path has never been submitted.
    pub fn state(&self, path: &Path) -> JobState {
        let inner = self.shared.inner.lock();
        if inner.jobs.contains_key(path) {
            JobState::Running
        } else {
            inner.finished.get(path).copied().unwrap_or(JobState::Idle)
        }
    }

    pub fn active_jobs(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.shared.inner.lock().jobs.keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl<Req, Ev> Drop for JobRegistry<Req, Ev> {
    fn drop(&mut self) {
        for job in self.shared.inner.lock().jobs.values() {
            job.cancel.cancel();
        }
    }
}

fn broadcast<Ev: Clone>(listeners: &mut Vec<Sender<JobEvent<Ev>>>, path: &Path, event: &Ev) {
    listeners.retain(|listener| {
        listener
            .send(JobEvent {
                path: path.to_path_buf(),
                event: event.clone(),
            })
            .is_ok()
    });
}

/// Relay loop for one job; runs on its own thread.
fn relay<Req, Ev: WorkerEvent>(
    name: &str,
    shared: &Shared<Ev>,
    path: &Path,
    id: u64,
    worker: WorkerHandle<Req, Ev>,
) {
    let events = worker.events().clone();
    let terminal = loop {
        match events.recv() {
            Ok(event) if event.is_terminal() => break Some(event),
            Ok(event) => {
                if (shared.relay_filter)(&event) {
                    forward(shared, path, id, event);
                }
            }
            Err(_) => break None,
        }
    };
    drop(events);

    let exit = worker.terminate();
    let terminal = match terminal {
        Some(event) => {
            if let Err(panic) = exit {
                warn!("[{name}] worker for {} panicked after finishing: {panic}", path.display());
            }
            event
        }
        None => {
            let detail = exit.err().unwrap_or_else(|| "event channel closed".to_string());
            warn!("[{name}] worker for {} died: {detail}", path.display());
            Ev::worker_exited(&detail)
        }
    };

    if !is_current(shared, path, id) {
        debug!("[{name}] job {id} for {} was terminated, dropping its result", path.display());
        return;
    }
    if let Some(hook) = &shared.hook {
        hook(path, &terminal);
    }
    if finish(shared, path, id, &terminal) {
        info!("[{name}] job {id} for {} finished", path.display());
    }
}

fn is_current<Ev>(shared: &Shared<Ev>, path: &Path, id: u64) -> bool {
    shared
        .inner
        .lock()
        .jobs
        .get(path)
        .is_some_and(|job| job.id == id)
}

fn forward<Ev: WorkerEvent>(shared: &Shared<Ev>, path: &Path, id: u64, event: Ev) {
    let mut guard = shared.inner.lock();
    let inner = &mut *guard;
    let Some(job) = inner.jobs.get_mut(path).filter(|job| job.id == id) else {
        return;
    };
    broadcast(&mut inner.listeners, path, &event);
    job.subscribers
        .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    job.replay.push(event);
}

/// Deregister job `id` and deliver its terminal event. Returns `false` if the
/// job had already been terminated.
fn finish<Ev: WorkerEvent>(shared: &Shared<Ev>, path: &Path, id: u64, terminal: &Ev) -> bool {
    let mut guard = shared.inner.lock();
    let inner = &mut *guard;
    if !inner.jobs.get(path).is_some_and(|job| job.id == id) {
        return false;
    }
    let Some(job) = inner.jobs.remove(path) else {
        return false;
    };
    let state = terminal.terminal_state().unwrap_or(JobState::Failed);
    inner.finished.insert(path.to_path_buf(), state);

    // Listeners before subscribers: a returned `wait` implies listeners saw it.
    broadcast(&mut inner.listeners, path, terminal);
    for subscriber in &job.subscribers {
        let _ = subscriber.send(terminal.clone());
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, ScanFailure};
    use crate::scanner::progress::ScanEvent;
    use crate::scanner::worker::spawn_worker;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// A spawner whose jobs emit one progress event, then wait for `gate`
    /// before completing with `outcome`.
    fn gated_spawner(
        spawned: Arc<AtomicUsize>,
        gate: Receiver<()>,
        outcome: ScanEvent,
    ) -> Spawner<u64, ScanEvent> {
        Arc::new(move |size: u64| {
            spawned.fetch_add(1, Ordering::SeqCst);
            let gate = gate.clone();
            let outcome = outcome.clone();
            let handle = spawn_worker("gated", move |size: u64, events, _cancel| {
                let _ = events.send(ScanEvent::Progress {
                    path: PathBuf::from("/job/child"),
                    size,
                });
                let _ = gate.recv_timeout(Duration::from_secs(10));
                outcome
            })?;
            handle.start(size)?;
            Ok(handle)
        })
    }

    fn collect(rx: &Receiver<ScanEvent>) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.recv_timeout(Duration::from_secs(10)) {
            let done = event.is_terminal();
            events.push(event);
            if done {
                break;
            }
        }
        events
    }

    fn wait_until_idle(registry: &JobRegistry<u64, ScanEvent>, path: &Path) {
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while registry.is_running(path) {
            assert!(std::time::Instant::now() < deadline, "job never finished");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn second_submit_joins_running_job_and_sees_same_events() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let outcome = ScanEvent::Cancelled;
        let registry = JobRegistry::new("test", gated_spawner(spawned.clone(), gate_rx, outcome));
        let path = PathBuf::from("/job");

        let (first, rx1) = registry.submit(path.clone(), 7).unwrap();
        // Wait for the progress event so the replay path is exercised.
        let early = rx1.recv_timeout(Duration::from_secs(10)).unwrap();
        let (second, rx2) = registry.submit(path.clone(), 7).unwrap();
        assert_eq!(first, Admission::Started);
        assert_eq!(second, Admission::AlreadyRunning);
        assert_eq!(registry.state(&path), JobState::Running);

        gate_tx.send(()).unwrap();
        let mut seen1 = vec![early];
        seen1.extend(collect(&rx1));
        let seen2 = collect(&rx2);

        assert_eq!(spawned.load(Ordering::SeqCst), 1, "only one worker spawned");
        assert_eq!(seen1, seen2);
        assert_eq!(seen1.last(), Some(&ScanEvent::Cancelled));
        wait_until_idle(&registry, &path);
        assert_eq!(registry.state(&path), JobState::Cancelled);
    }

    #[test]
    fn finished_job_is_deregistered_and_path_can_run_again() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let failure = ScanEvent::Error(ScanFailure::new(FailureKind::PathAccess, "denied"));
        let registry = JobRegistry::new("test", gated_spawner(spawned.clone(), gate_rx, failure));
        let path = PathBuf::from("/job");

        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        let (_, rx) = registry.submit(path.clone(), 1).unwrap();
        assert!(matches!(collect(&rx).last(), Some(ScanEvent::Error(_))));
        wait_until_idle(&registry, &path);
        assert_eq!(registry.state(&path), JobState::Failed);

        let (admission, rx) = registry.submit(path.clone(), 1).unwrap();
        assert_eq!(admission, Admission::Started);
        collect(&rx);
        assert_eq!(spawned.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_worker_is_reported_as_failure() {
        let spawner: Spawner<(), ScanEvent> = Arc::new(|_| {
            let handle = spawn_worker("doomed", |_: (), _events, _cancel| -> ScanEvent {
                panic!("worker blew up")
            })?;
            handle.start(())?;
            Ok(handle)
        });
        let registry = JobRegistry::new("test", spawner);
        let path = PathBuf::from("/doomed");
        let (_, rx) = registry.submit(path.clone(), ()).unwrap();

        match rx.recv_timeout(Duration::from_secs(10)).unwrap() {
            ScanEvent::Error(failure) => {
                assert_eq!(failure.kind, FailureKind::WorkerFailure);
                assert!(failure.message.contains("worker blew up"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while registry.is_running(&path) {
            assert!(std::time::Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(registry.state(&path), JobState::Failed);
    }

    #[test]
    fn terminate_notifies_subscribers_immediately() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let (gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let outcome = ScanEvent::Error(ScanFailure::new(FailureKind::Internal, "late"));
        let registry = JobRegistry::new("test", gated_spawner(spawned, gate_rx, outcome));
        let path = PathBuf::from("/job");
        let listener = registry.listen();

        let (_, rx) = registry.submit(path.clone(), 3).unwrap();
        assert!(registry.terminate(&path));
        assert!(!registry.is_running(&path));
        assert_eq!(registry.state(&path), JobState::Cancelled);

        let events = collect(&rx);
        assert_eq!(events.last(), Some(&ScanEvent::Cancelled));
        // The worker's late error never reaches the subscriber.
        gate_tx.send(()).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        let tagged: Vec<JobEvent<ScanEvent>> = listener.try_iter().collect();
        assert!(tagged
            .iter()
            .any(|e| e.path == path && e.event == ScanEvent::Cancelled));
        assert!(!registry.terminate(&path));
    }

    #[test]
    fn dropping_the_registry_cancels_running_jobs() {
        let spawner: Spawner<(), ScanEvent> = Arc::new(|_| {
            let handle = spawn_worker("patient", |_: (), _events, cancel: &CancelToken| {
                let deadline = std::time::Instant::now() + Duration::from_secs(10);
                while !cancel.is_cancelled() && std::time::Instant::now() < deadline {
                    thread::sleep(Duration::from_millis(5));
                }
                ScanEvent::Cancelled
            })?;
            handle.start(())?;
            Ok(handle)
        });
        let registry = JobRegistry::new("test", spawner);
        let (_, rx) = registry.submit(PathBuf::from("/long"), ()).unwrap();
        let started = std::time::Instant::now();
        drop(registry);

        assert_eq!(collect(&rx).last(), Some(&ScanEvent::Cancelled));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn cancel_unknown_path_is_a_no_op() {
        let spawned = Arc::new(AtomicUsize::new(0));
        let (_gate_tx, gate_rx) = crossbeam_channel::unbounded();
        let registry = JobRegistry::new(
            "test",
            gated_spawner(spawned, gate_rx, ScanEvent::Cancelled),
        );
        assert!(!registry.cancel(Path::new("/nothing")));
        assert_eq!(registry.state(Path::new("/nothing")), JobState::Idle);
        assert!(registry.active_jobs().is_empty());
    }
}
