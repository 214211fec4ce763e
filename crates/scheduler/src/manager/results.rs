use tracing::warn;

use jobpool_core::{JobId, JobResult};

use super::core::Manager;

/// Blocking iterator over job results, in arrival order.
///
/// Polls the manager until a result is ready and ends once the manager is
/// empty. Returned by [`Manager::results`].
pub struct Results<'a, T> {
    manager: &'a mut Manager<T>,
}

impl<T: Send + 'static> Manager<T> {
    /// Iterate over results as they complete, driving the manager while
    /// waiting. Dropping the iterator early leaves the remaining work in
    /// place for a later call.
    pub fn results(&mut self) -> Results<'_, T> {
        Results { manager: self }
    }

    /// Only unlaunchable jobs left: the manager is shut down, or its
    /// capacity admits no worker even with nothing running. No poll can
    /// make progress.
    fn is_stalled(&self) -> bool {
        (!self.active || self.is_full())
            && self.active_workers.is_empty()
            && self.waiting_results.is_empty()
            && self.completed_results.is_empty()
    }
}

impl<T: Send + 'static> Iterator for Results<'_, T> {
    type Item = (JobId, JobResult<T>);

    fn next(&mut self) -> Option<Self::Item> {
        let manager = &mut *self.manager;
        loop {
            if let Some(item) = manager.completed_results.pop_front() {
                return Some(item);
            }
            if manager.is_empty() {
                return None;
            }
            if manager.is_stalled() {
                warn!(
                    queued = manager.waiting_jobs.len(),
                    active = manager.active,
                    capacity = %manager.capacity,
                    "no queued job can be launched, ending result iteration"
                );
                return None;
            }
            manager.wait();
            manager.poll();
        }
    }
}
