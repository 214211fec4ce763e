use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use jobpool_channel::ChannelError;
use jobpool_core::{JobError, JobId, JobResult};
use jobpool_worker::Entrypoint;

use super::core::{ActiveWorker, Manager};
use crate::cycle::{job_cycle, Job};

impl<T: Send + 'static> Manager<T> {
    /// Advance the manager by one step: reap finished workers, launch
    /// queued jobs while capacity allows, then drain the result channel.
    ///
    /// Blocks for at most one receive timeout.
    pub fn poll(&mut self) {
        self.reap();
        self.dispatch();
        self.drain();
    }

    fn reap(&mut self) {
        let finished: Vec<JobId> = self
            .active_workers
            .iter_mut()
            .filter_map(|(id, worker)| (!worker.handle.is_running()).then_some(*id))
            .collect();

        for id in finished {
            let Some(mut worker) = self.active_workers.shift_remove(&id) else {
                continue;
            };
            worker.handle.join();
            self.stats.record_run(worker.launched.elapsed());

            let status = worker.handle.exit_status();
            if status == 0 {
                debug!(job_id = %id, "worker finished, awaiting result");
                self.waiting_results.insert(id);
                continue;
            }

            let error = worker
                .handle
                .take_error()
                .unwrap_or_else(|| JobError::exit_code(status));
            warn!(job_id = %id, exit_status = status, "worker failed without a result: {}", error.summary());
            self.stats.crashed += 1;
            self.complete(id, JobResult::error(error));
        }
    }

    fn dispatch(&mut self) {
        while self.active && !self.is_full() {
            let Some(job) = self.waiting_jobs.pop_front() else {
                break;
            };
            self.launch(job);
        }
    }

    fn launch(&mut self, job: Job<T>) {
        let Job { id, target } = job;
        let channel = Arc::clone(&self.channel);
        let entry: Entrypoint = Box::new(move || {
            job_cycle(&*channel, id, target)
                .map_err(|e| JobError::runtime(format!("result delivery failed: {e}")))
        });

        match self.job_factory.launch(id, entry) {
            Ok(handle) => {
                self.stats.launched += 1;
                self.active_workers.insert(
                    id,
                    ActiveWorker {
                        handle,
                        launched: Instant::now(),
                    },
                );
                debug!(job_id = %id, running = self.active_workers.len(), "job launched");
            }
            Err(e) => {
                error!(job_id = %id, "launch failed: {e}");
                self.stats.launch_failures += 1;
                self.complete(id, JobResult::error(JobError::runtime(format!("launch failed: {e}"))));
            }
        }
    }

    fn drain(&mut self) {
        loop {
            match self.channel.get(self.waittime) {
                Ok((id, result)) => self.accept(id, result),
                Err(ChannelError::Empty) => break,
                Err(e) => {
                    error!("result channel fault: {e}");
                    break;
                }
            }
        }
    }

    fn accept(&mut self, id: JobId, result: JobResult<T>) {
        // The result may arrive before the worker was seen to exit.
        let was_running = match self.active_workers.shift_remove(&id) {
            Some(mut worker) => {
                worker.handle.join();
                self.stats.record_run(worker.launched.elapsed());
                true
            }
            None => false,
        };
        let was_expected = self.waiting_results.remove(&id);

        if !was_running && !was_expected {
            warn!(job_id = %id, "dropping result for a job that already has one");
            self.stats.late_duplicates += 1;
            return;
        }

        debug!(job_id = %id, success = result.is_success(), "result received");
        self.complete(id, result);
    }
}
