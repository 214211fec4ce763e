use tracing::warn;

use jobpool_channel::{ChannelError, ResultChannel};
use jobpool_core::{capture_panic, JobError, JobId, JobResult};

/// The work a job performs.
pub type Target<T> = Box<dyn FnOnce() -> Result<T, JobError> + Send + 'static>;

/// A submitted job waiting for a worker.
pub(crate) struct Job<T> {
    pub(crate) id: JobId,
    pub(crate) target: Target<T>,
}

/// Run `target` and post exactly one result for `id`.
///
/// A returned error and a panic both become `JobResult::Error`; a panic
/// carries the stacktrace captured at the panic site when the carrier hook
/// is enabled. If the result cannot be posted, a small `RuntimeError`
/// describing the delivery failure is posted in its place. Only when that
/// fails as well is the channel error returned, and the worker running the
/// cycle is expected to exit as failed.
pub fn job_cycle<T>(
    channel: &dyn ResultChannel<T>,
    id: JobId,
    target: Target<T>,
) -> Result<(), ChannelError> {
    let (outcome, trace) = capture_panic(target);
    let result = match outcome {
        Ok(Ok(value)) => JobResult::success(value),
        Ok(Err(error)) => JobResult::error(error),
        Err(payload) => {
            JobResult::error(JobError::from_panic(payload.as_ref()).attach_stacktrace(trace))
        }
    };

    if let Err(e) = channel.put(id, result) {
        warn!(job_id = %id, "result delivery failed: {e}");
        let fallback = JobError::runtime(format!("result delivery failed: {e}"));
        channel.put(id, JobResult::error(fallback))?;
    }
    Ok(())
}
