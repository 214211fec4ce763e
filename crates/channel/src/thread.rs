use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use jobpool_core::{JobId, JobResult};

use crate::error::ChannelError;
use crate::traits::ResultChannel;

/// In-memory result channel for thread workers.
///
/// Results are moved, not serialized, so any `Send` value type works.
pub struct ThreadChannel<T> {
    sender: Sender<(JobId, JobResult<T>)>,
    receiver: Receiver<(JobId, JobResult<T>)>,
}

impl<T> ThreadChannel<T> {
    pub fn new() -> Self {
        let (sender, receiver) = channel::unbounded();
        Self { sender, receiver }
    }

    /// Number of results posted but not yet received.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for ThreadChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ResultChannel<T> for ThreadChannel<T> {
    fn put(&self, job_id: JobId, result: JobResult<T>) -> Result<(), ChannelError> {
        self.sender
            .send((job_id, result))
            .map_err(|_| ChannelError::Disconnected)
    }

    fn get(&self, timeout: Duration) -> Result<(JobId, JobResult<T>), ChannelError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(message) => Ok(message),
            Err(RecvTimeoutError::Timeout) => Err(ChannelError::Empty),
            Err(RecvTimeoutError::Disconnected) => Err(ChannelError::Disconnected),
        }
    }
}
