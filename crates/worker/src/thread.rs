use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use jobpool_core::{capture_panic, JobError, JobId, Strategy};

use crate::error::WorkerError;
use crate::handle::{Entrypoint, JobFactory, WorkerHandle};

/// Worker backed by an OS thread.
///
/// The thread body never unwinds: the entrypoint runs under
/// [`capture_panic`] and any failure comes back through the join as a
/// [`JobError`]. The exit status is derived from that outcome, `0` on
/// success and `1` on failure.
pub struct ThreadWorker {
    id: JobId,
    handle: Option<JoinHandle<Result<(), JobError>>>,
    exit_status: i32,
    error: Option<JobError>,
}

impl ThreadWorker {
    fn spawn(id: JobId, entry: Entrypoint, propagate: bool) -> Result<Self, WorkerError> {
        let handle = thread::Builder::new()
            .name(format!("jobpool-{}", id.short()))
            .spawn(move || run_entry(id, entry, propagate))?;

        Ok(Self {
            id,
            handle: Some(handle),
            exit_status: 0,
            error: None,
        })
    }
}

fn run_entry(id: JobId, entry: Entrypoint, propagate: bool) -> Result<(), JobError> {
    let (outcome, trace) = capture_panic(entry);
    let failure = match outcome {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(error)) => error,
        Err(payload) => JobError::from_panic(payload.as_ref()).attach_stacktrace(trace),
    };

    if propagate {
        eprintln!("{}", failure.report());
        error!(job_id = %id, "worker failed: {}", failure.summary());
    }
    Err(failure)
}

impl WorkerHandle for ThreadWorker {
    fn id(&self) -> JobId {
        self.id
    }

    fn is_running(&mut self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        match handle.join() {
            Ok(Ok(())) => self.exit_status = 0,
            Ok(Err(error)) => {
                self.exit_status = 1;
                self.error = Some(error);
            }
            // The body catches panics itself; this only triggers if a panic
            // escapes while reporting one.
            Err(payload) => {
                self.exit_status = 1;
                self.error = Some(JobError::from_panic(payload.as_ref()));
            }
        }
        debug!(job_id = %self.id, exit_status = self.exit_status, "thread worker joined");
    }

    fn exit_status(&self) -> i32 {
        self.exit_status
    }

    fn take_error(&mut self) -> Option<JobError> {
        self.error.take()
    }
}

/// Launches one [`ThreadWorker`] per job.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadFactory {
    propagate_error_message: bool,
}

impl ThreadFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Print a worker's failure to stderr as soon as it happens.
    pub fn propagate_error_message(mut self, propagate: bool) -> Self {
        self.propagate_error_message = propagate;
        self
    }
}

impl JobFactory for ThreadFactory {
    fn strategy(&self) -> Strategy {
        Strategy::Thread
    }

    fn launch(&self, id: JobId, entry: Entrypoint) -> Result<Box<dyn WorkerHandle>, WorkerError> {
        let worker = ThreadWorker::spawn(id, entry, self.propagate_error_message)?;
        debug!(job_id = %id, "thread worker launched");
        Ok(Box::new(worker))
    }
}
