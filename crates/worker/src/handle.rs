use jobpool_core::{JobError, JobId, Strategy};

use crate::error::WorkerError;

/// Code a worker runs. Returning `Err` marks the worker as failed with
/// that error; the same holds for a panic escaping the entrypoint.
pub type Entrypoint = Box<dyn FnOnce() -> Result<(), JobError> + Send + 'static>;

/// Manager-side view of one launched worker.
pub trait WorkerHandle: Send {
    /// Job this worker runs.
    fn id(&self) -> JobId;

    /// Non-blocking liveness check.
    fn is_running(&mut self) -> bool;

    /// Block until the worker has finished. Idempotent.
    fn join(&mut self);

    /// `0` for a clean exit, a positive code for a failure and the negated
    /// signal number for a process killed by a signal. Only meaningful
    /// after [`join`](Self::join).
    fn exit_status(&self) -> i32;

    /// The failure the worker captured itself, if any. Returned once.
    fn take_error(&mut self) -> Option<JobError>;

    fn can_force_stop(&self) -> bool {
        false
    }

    fn force_stop(&mut self) -> Result<(), WorkerError> {
        Err(WorkerError::ForceStopUnsupported)
    }
}

/// Launches workers for one strategy.
pub trait JobFactory: Send + Sync {
    fn strategy(&self) -> Strategy;

    fn launch(&self, id: JobId, entry: Entrypoint) -> Result<Box<dyn WorkerHandle>, WorkerError>;
}
