use thiserror::Error;

use jobpool_channel::ChannelError;
use jobpool_core::CoreError;

/// Infrastructure failures of the scheduler itself. Job failures never
/// show up here: they are delivered as `JobResult::Error`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("result channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("configuration error: {0}")]
    Config(#[from] CoreError),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
