/// Isolated worker threads.
///
/// Each job runs on its own named OS thread. The coordinator talks to it only
/// through a command channel (inward) and a bounded event channel (outward);
/// every value crossing either channel is owned, so no mutable state is
/// shared. The one exception is the [`CancelToken`], a single atomic flag the
/// worker polls at directory boundaries.
use crate::error::{EngineError, Result};
use crate::scanner::progress::{WorkerCommand, WorkerEvent};
use crate::scanner::PROGRESS_CHANNEL_CAPACITY;
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, warn};

/// Cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Coordinator-side handle to one worker thread.
pub struct WorkerHandle<Req, Ev> {
    commands: Option<Sender<WorkerCommand<Req>>>,
    events: Receiver<Ev>,
    cancel: CancelToken,
    thread: Option<thread::JoinHandle<()>>,
}

/// Spawn a worker thread that waits for [`WorkerCommand::Start`] and then
/// runs `job` once.
///
/// `job` streams non-terminal events through the sender it is given and
/// returns the terminal event, which the worker sends last.
pub fn spawn_worker<Req, Ev, F>(name: &str, job: F) -> Result<WorkerHandle<Req, Ev>>
where
    Req: Send + 'static,
    Ev: WorkerEvent,
    F: FnOnce(Req, &Sender<Ev>, &CancelToken) -> Ev + Send + 'static,
{
    let (command_tx, command_rx) = crossbeam_channel::bounded::<WorkerCommand<Req>>(1);
    let (event_tx, event_rx) = crossbeam_channel::bounded::<Ev>(PROGRESS_CHANNEL_CAPACITY);
    let cancel = CancelToken::new();
    let worker_cancel = cancel.clone();

    let thread = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || match command_rx.recv() {
            Ok(WorkerCommand::Start(request)) => {
                let terminal = job(request, &event_tx, &worker_cancel);
                debug_assert!(terminal.is_terminal(), "job returned a non-terminal event");
                let _ = event_tx.send(terminal);
            }
            Ok(WorkerCommand::Shutdown) | Err(_) => {
                debug!("worker shut down before receiving a job");
            }
        })
        .map_err(EngineError::Spawn)?;

    Ok(WorkerHandle {
        commands: Some(command_tx),
        events: event_rx,
        cancel,
        thread: Some(thread),
    })
}

impl<Req, Ev> WorkerHandle<Req, Ev> {
    /// Hand the worker its job.
    pub fn start(&self, request: Req) -> Result<()> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| EngineError::WorkerExited("worker already terminated".into()))?;
        commands
            .send(WorkerCommand::Start(request))
            .map_err(|_| EngineError::WorkerExited("worker exited before start".into()))
    }

    pub fn events(&self) -> &Receiver<Ev> {
        &self.events
    }

    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Stop the worker and wait for its thread to exit.
    ///
    /// Returns the panic message if the thread died abnormally.
    pub fn terminate(mut self) -> std::result::Result<(), String> {
        self.cancel.cancel();
        if let Some(commands) = self.commands.take() {
            let _ = commands.try_send(WorkerCommand::Shutdown);
        }
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|payload| panic_message(payload.as_ref())),
            None => Ok(()),
        }
    }
}

impl<Req, Ev> Drop for WorkerHandle<Req, Ev> {
    fn drop(&mut self) {
        // A handle dropped without `terminate` leaves the thread detached;
        // make sure it stops at the next directory boundary.
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        warn!("worker panicked with a non-string payload");
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::progress::ScanEvent;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn job_events_arrive_in_order_and_terminal_is_last() {
        let handle = spawn_worker("test-worker", |n: u64, tx: &Sender<ScanEvent>, _c| {
            for i in 0..n {
                let _ = tx.send(ScanEvent::Progress {
                    path: PathBuf::from(format!("/{i}")),
                    size: i,
                });
            }
            ScanEvent::Cancelled
        })
        .unwrap();
        handle.start(3).unwrap();

        let received: Vec<ScanEvent> = handle.events().iter().take(4).collect();
        assert_eq!(received.len(), 4);
        for (i, event) in received.iter().take(3).enumerate() {
            assert_eq!(
                event,
                &ScanEvent::Progress {
                    path: PathBuf::from(format!("/{i}")),
                    size: i as u64
                }
            );
        }
        assert_eq!(received[3], ScanEvent::Cancelled);
        assert!(handle.terminate().is_ok());
    }

    #[test]
    fn cancel_token_is_visible_to_the_job() {
        let handle = spawn_worker("test-cancel", |_: (), _tx: &Sender<ScanEvent>, cancel| {
            let deadline = std::time::Instant::now() + Duration::from_secs(10);
            while !cancel.is_cancelled() && std::time::Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            if cancel.is_cancelled() {
                ScanEvent::Cancelled
            } else {
                ScanEvent::worker_exited("never cancelled")
            }
        })
        .unwrap();
        handle.start(()).unwrap();
        handle.cancel();
        let terminal = handle
            .events()
            .recv_timeout(Duration::from_secs(10))
            .unwrap();
        assert_eq!(terminal, ScanEvent::Cancelled);
        assert!(handle.terminate().is_ok());
    }

    #[test]
    fn panicking_job_disconnects_without_terminal() {
        let handle = spawn_worker("test-panic", |_: (), _tx: &Sender<ScanEvent>, _c| -> ScanEvent {
            panic!("disk on fire")
        })
        .unwrap();
        handle.start(()).unwrap();
        assert!(handle.events().recv_timeout(Duration::from_secs(10)).is_err());
        let err = handle.terminate().unwrap_err();
        assert!(err.contains("disk on fire"));
    }

    #[test]
    fn terminate_before_start_is_clean() {
        let handle =
            spawn_worker("test-idle", |_: (), _tx: &Sender<ScanEvent>, _c| ScanEvent::Cancelled)
                .unwrap();
        assert!(handle.terminate().is_ok());
    }
}
