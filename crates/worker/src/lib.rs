//! Execution units for jobs.
//!
//! A [`JobFactory`] turns an [`Entrypoint`] into a running worker and hands
//! back a [`WorkerHandle`] the manager polls, joins and, where the worker
//! kind allows it, force-stops. Two strategies are provided:
//!
//! - [`ThreadFactory`]: one OS thread per job;
//! - [`ProcessFactory`]: one forked child process per job.

use std::sync::Arc;

use jobpool_core::Strategy;

pub mod error;
pub mod handle;
pub mod process;
pub mod thread;

pub use error::WorkerError;
pub use handle::{Entrypoint, JobFactory, WorkerHandle};
pub use process::{ProcessFactory, ProcessWorker};
pub use thread::{ThreadFactory, ThreadWorker};

/// Job factory for a configured strategy.
///
/// `propagate_error_message` only affects thread workers: a forked worker
/// already writes its own failure to the inherited stderr.
pub fn factory_for(strategy: Strategy, propagate_error_message: bool) -> Arc<dyn JobFactory> {
    match strategy {
        Strategy::Thread => Arc::new(ThreadFactory::new().propagate_error_message(propagate_error_message)),
        Strategy::Process => Arc::new(ProcessFactory::new()),
    }
}
