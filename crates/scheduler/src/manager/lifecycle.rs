use std::thread;

use tracing::{debug, info, warn};

use super::core::Manager;

impl<T: Send + 'static> Manager<T> {
    /// Sleep for the configured wait time.
    pub fn wait(&self) {
        thread::sleep(self.waittime);
    }

    /// Stop launching queued jobs. Running workers keep being reaped and
    /// drained.
    pub fn shutdown(&mut self) {
        if self.active {
            info!(queued = self.waiting_jobs.len(), "manager shut down");
        }
        self.active = false;
    }

    /// Resume launching queued jobs.
    pub fn resume(&mut self) {
        if !self.active {
            info!(queued = self.waiting_jobs.len(), "manager resumed");
        }
        self.active = true;
    }

    /// Shut down and wait for every running worker, collecting their
    /// results. Queued jobs stay queued.
    pub fn join(&mut self) {
        self.shutdown();
        while !self.active_workers.is_empty() {
            self.poll();
            if !self.active_workers.is_empty() {
                self.wait();
            }
        }
        self.poll();
    }

    /// Shut down, force-stop every worker that allows it, discard queued
    /// jobs and wait for the rest.
    pub fn terminate(&mut self) {
        self.shutdown();

        for worker in self.active_workers.values_mut() {
            let handle = &mut worker.handle;
            if !handle.can_force_stop() {
                continue;
            }
            match handle.force_stop() {
                Ok(()) => debug!(job_id = %handle.id(), "worker force-stopped"),
                Err(e) => debug!(job_id = %handle.id(), "force stop failed: {e}"),
            }
        }

        let discarded = self.waiting_jobs.len();
        if discarded > 0 {
            warn!(discarded, "discarding queued jobs");
            self.waiting_jobs.clear();
            self.stats.discarded += discarded as u64;
        }

        self.join();
        info!(collected = self.completed_results.len(), "manager terminated");
    }
}
