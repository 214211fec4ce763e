use std::sync::Arc;
use std::time::Duration;

use jobpool_core::{JobId, JobResult};

use crate::error::ChannelError;

/// FIFO channel carrying `(job id, result)` pairs from workers to the
/// manager.
///
/// Implementations must accept concurrent `put` calls from any number of
/// workers while a single consumer calls `get`.
pub trait ResultChannel<T>: Send + Sync {
    /// Post one job's result.
    fn put(&self, job_id: JobId, result: JobResult<T>) -> Result<(), ChannelError>;

    /// Wait up to `timeout` for the next result. Returns
    /// [`ChannelError::Empty`] when nothing arrived in time.
    fn get(&self, timeout: Duration) -> Result<(JobId, JobResult<T>), ChannelError>;
}

/// Creates and releases result channels.
pub trait ChannelFactory<T>: Send + Sync {
    fn create(&self) -> Result<Arc<dyn ResultChannel<T>>, ChannelError>;

    /// Release a channel obtained from [`create`](Self::create). Workers
    /// still holding a clone keep their end alive until they finish.
    fn destroy(&self, channel: Arc<dyn ResultChannel<T>>);
}
