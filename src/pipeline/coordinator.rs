//! Orchestrator: owns the two worker threads and their shared state.
//!
//! Startup is a two-way rendezvous. Each worker warms up its collaborators
//! on its own thread and reports back; only when both are ready are they
//! released into their loops. A warm-up failure on either side stops both
//! and is returned from [`Orchestrator::start`].

use super::Shared;
use super::capture::{CaptureCollaborators, CaptureWorker};
use super::response::{ResponseCollaborators, ResponseWorker};
use crate::audio::wav::WavDumper;
use crate::clock::{Clock, SystemClock};
use crate::collaborators::StatusSink;
use crate::config::HarkConfig;
use crate::error::{HarkError, Result};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const CAPTURE_THREAD: &str = "hark-capture";
const RESPONSE_THREAD: &str = "hark-response";

/// A long-lived pipeline worker.
trait Worker: Send + 'static {
    fn warm_up(&mut self) -> Result<()>;
    fn run(self, cancel: &CancellationToken);
}

impl Worker for CaptureWorker {
    fn warm_up(&mut self) -> Result<()> {
        CaptureWorker::warm_up(self)
    }

    fn run(self, cancel: &CancellationToken) {
        CaptureWorker::run(self, cancel);
    }
}

impl Worker for ResponseWorker {
    fn warm_up(&mut self) -> Result<()> {
        ResponseWorker::warm_up(self)
    }

    fn run(self, cancel: &CancellationToken) {
        ResponseWorker::run(self, cancel);
    }
}

type Readiness = (&'static str, Result<()>);

/// Runs the capture and response workers.
pub struct Orchestrator {
    config: HarkConfig,
    shared: Shared,
    cancel: CancellationToken,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Orchestrator {
    /// Create an orchestrator on the system clock.
    pub fn new(config: HarkConfig, status: Arc<dyn StatusSink>) -> Self {
        Self::with_clock(config, status, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: HarkConfig,
        status: Arc<dyn StatusSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            shared: Shared::new(status, clock),
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Queue, counter and playback flag shared by the workers.
    pub fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Get a clone of the cancellation token for external use.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Build both workers, warm them up and start their loops.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker cannot be built, a thread cannot be
    /// spawned, or a collaborator fails to warm up. Both threads have been
    /// joined when an error is returned.
    pub fn start(
        &mut self,
        capture: CaptureCollaborators,
        response: ResponseCollaborators,
    ) -> Result<()> {
        if !self.handles.is_empty() {
            return Err(HarkError::Pipeline("orchestrator already started".into()));
        }
        info!("starting voice pipeline");

        let dumps = self.config.audio.dump_dir.clone().map(WavDumper::new);
        let mut capture_worker = CaptureWorker::new(
            self.config.capture.clone(),
            &self.config.conversation,
            capture,
            self.shared.clone(),
        );
        let mut response_worker = ResponseWorker::new(&self.config, response, self.shared.clone())?;
        if let Some(dumps) = dumps {
            capture_worker = capture_worker.with_dumps(dumps.clone());
            response_worker = response_worker.with_dumps(dumps);
        }

        let (ready_tx, ready_rx) = bounded::<Readiness>(2);
        let mut go = Vec::with_capacity(2);

        let (go_tx, go_rx) = bounded(1);
        go.push(go_tx);
        self.spawn(CAPTURE_THREAD, capture_worker, ready_tx.clone(), go_rx)?;

        let (go_tx, go_rx) = bounded(1);
        go.push(go_tx);
        if let Err(e) = self.spawn(RESPONSE_THREAD, response_worker, ready_tx, go_rx) {
            self.abort_startup(go);
            return Err(e);
        }

        let mut failure = None;
        for _ in 0..2 {
            match ready_rx.recv() {
                Ok((name, Ok(()))) => info!(worker = name, "worker ready"),
                Ok((name, Err(e))) => {
                    error!(worker = name, "worker failed to start: {e}");
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(HarkError::Pipeline(
                        "worker exited during startup".into(),
                    ));
                    break;
                }
            }
        }

        if let Some(e) = failure {
            self.abort_startup(go);
            return Err(e);
        }
        for tx in go {
            // A worker that already exited shows up in `wait`.
            let _ = tx.send(true);
        }
        info!("voice pipeline running");
        Ok(())
    }

    fn spawn<W: Worker>(
        &mut self,
        name: &'static str,
        mut worker: W,
        ready: Sender<Readiness>,
        go: Receiver<bool>,
    ) -> Result<()> {
        let cancel = self.cancel.clone();
        let handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let warm = worker.warm_up();
                let warmed = warm.is_ok();
                if ready.send((name, warm)).is_err() || !warmed {
                    return;
                }
                drop(ready);
                if matches!(go.recv(), Ok(true)) {
                    worker.run(&cancel);
                }
            })?;
        self.handles.push((name, handle));
        Ok(())
    }

    fn abort_startup(&mut self, go: Vec<Sender<bool>>) {
        self.cancel.cancel();
        for tx in go {
            let _ = tx.send(false);
        }
        if let Err(e) = self.join_all() {
            warn!("worker failed during aborted startup: {e}");
        }
    }

    /// Request graceful shutdown of both workers.
    pub fn shutdown(&self) {
        info!("shutting down voice pipeline");
        self.cancel.cancel();
    }

    /// Block until both workers have exited.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker thread panicked.
    pub fn wait(mut self) -> Result<()> {
        self.join_all()
    }

    fn join_all(&mut self) -> Result<()> {
        let mut result = Ok(());
        for (name, handle) in self.handles.drain(..) {
            if handle.join().is_err() {
                error!(worker = name, "worker thread panicked");
                result = Err(HarkError::Pipeline(format!("{name} thread panicked")));
            }
        }
        result
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if !self.handles.is_empty() {
            self.cancel.cancel();
            let _ = self.join_all();
        }
    }
}
