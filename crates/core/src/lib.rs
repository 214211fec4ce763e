//! Shared vocabulary of the job scheduler: job identifiers, job results and
//! errors, the capacity policy, scheduler configuration, and the stacktrace
//! carrier that keeps worker failures diagnosable after they cross a thread
//! or process boundary.

pub mod capacity;
pub mod config;
pub mod error;
pub mod job;
pub mod stacktrace;

pub use capacity::Capacity;
pub use config::{SchedulerConfig, Strategy};
pub use error::CoreError;
pub use job::{JobError, JobId, JobResult};
pub use stacktrace::{capture_panic, Stacktrace, StacktraceCarrier};
