//! Poll-driven job scheduling.
//!
//! A [`Manager`] queues submitted jobs, launches them onto workers as its
//! [`Capacity`] allows and hands back one [`JobResult`] per job through
//! [`Manager::results`]. Workers are threads or forked processes, chosen by
//! the [`JobFactory`]; results travel back through a [`ResultChannel`].
//!
//! ```no_run
//! use jobpool_scheduler::{Capacity, Creator, JobError};
//!
//! let creator = Creator::threads(Capacity::limited(2));
//! let mut manager = creator.create()?;
//! for n in 0..5u64 {
//!     manager.submit(move || {
//!         if n == 3 {
//!             return Err(JobError::new("ValueError", "boom"));
//!         }
//!         Ok(n * n)
//!     });
//! }
//! for (id, result) in manager.results() {
//!     println!("{id}: {result:?}");
//! }
//! creator.destroy(manager);
//! # Ok::<(), jobpool_scheduler::SchedulerError>(())
//! ```

pub mod creator;
pub mod cycle;
pub mod error;
pub mod manager;
pub mod stats;

pub use creator::Creator;
pub use cycle::{job_cycle, Target};
pub use error::{SchedulerError, SchedulerResult};
pub use manager::{Manager, Results};
pub use stats::ManagerStats;

pub use jobpool_channel::{
    ChannelError, ChannelFactory, ProcessChannelFactory, ResultChannel, ThreadChannelFactory,
};
pub use jobpool_core::{
    Capacity, JobError, JobId, JobResult, SchedulerConfig, Stacktrace, StacktraceCarrier, Strategy,
};
pub use jobpool_worker::{
    factory_for, JobFactory, ProcessFactory, ThreadFactory, WorkerError, WorkerHandle,
};
