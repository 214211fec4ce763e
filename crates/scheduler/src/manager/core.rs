use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use tracing::{debug, info};

use jobpool_channel::ResultChannel;
use jobpool_core::{Capacity, JobError, JobId, JobResult, StacktraceCarrier, Strategy};
use jobpool_worker::{JobFactory, WorkerHandle};

use crate::cycle::Job;
use crate::stats::ManagerStats;

const DEFAULT_WAITTIME: Duration = Duration::from_millis(10);

/// A launched worker and when it started.
pub(super) struct ActiveWorker {
    pub(super) handle: Box<dyn WorkerHandle>,
    pub(super) launched: Instant,
}

/// Dispatches submitted jobs onto a bounded pool of workers and collects
/// their results.
///
/// The manager is driven entirely by its caller: nothing happens between
/// calls to [`poll`](Self::poll), which [`results`](Self::results),
/// [`join`](Self::join) and [`terminate`](Self::terminate) invoke as needed.
/// Every submitted job that is launched produces exactly one result.
pub struct Manager<T> {
    pub(super) channel: Arc<dyn ResultChannel<T>>,
    pub(super) job_factory: Arc<dyn JobFactory>,
    pub(super) capacity: Capacity,
    pub(super) waittime: Duration,
    pub(super) carrier: StacktraceCarrier,
    pub(super) stats: ManagerStats,
    /// Submitted, not yet launched (FIFO).
    pub(super) waiting_jobs: VecDeque<Job<T>>,
    /// Launched and not yet reaped, in launch order.
    pub(super) active_workers: IndexMap<JobId, ActiveWorker>,
    /// Reaped with a clean exit; the result is still on the channel.
    pub(super) waiting_results: HashSet<JobId>,
    /// Ready for the caller, in arrival order.
    pub(super) completed_results: VecDeque<(JobId, JobResult<T>)>,
    pub(super) active: bool,
}

impl<T: Send + 'static> Manager<T> {
    /// Create a manager posting results through `channel`. The manager
    /// starts resumed.
    pub fn new(
        channel: Arc<dyn ResultChannel<T>>,
        job_factory: Arc<dyn JobFactory>,
        capacity: Capacity,
    ) -> Self {
        info!(capacity = %capacity, strategy = %job_factory.strategy(), "manager created");
        Self {
            channel,
            job_factory,
            capacity,
            waittime: DEFAULT_WAITTIME,
            carrier: StacktraceCarrier::new(),
            stats: ManagerStats::default(),
            waiting_jobs: VecDeque::new(),
            active_workers: IndexMap::new(),
            waiting_results: HashSet::new(),
            completed_results: VecDeque::new(),
            active: true,
        }
    }

    /// Sleep between polls and receive timeout while draining.
    pub fn with_waittime(mut self, waittime: Duration) -> Self {
        self.waittime = waittime;
        self
    }

    /// Share a carrier with the caller instead of the manager's own.
    pub fn with_carrier(mut self, carrier: StacktraceCarrier) -> Self {
        self.carrier = carrier;
        self
    }

    /// Queue a job. Never blocks; the job is launched by a later poll.
    pub fn submit<F>(&mut self, target: F) -> JobId
    where
        F: FnOnce() -> Result<T, JobError> + Send + 'static,
    {
        let id = JobId::new();
        self.waiting_jobs.push_back(Job {
            id,
            target: Box::new(target),
        });
        self.stats.submitted += 1;
        debug!(job_id = %id, queued = self.waiting_jobs.len(), "job submitted");
        id
    }
}

impl<T> Manager<T> {
    /// Jobs not yet finished: running plus queued.
    pub fn job_count(&self) -> usize {
        self.active_workers.len() + self.waiting_jobs.len()
    }

    /// Workers currently running.
    pub fn process_count(&self) -> usize {
        self.active_workers.len()
    }

    /// Nothing queued, running, expected or waiting to be collected.
    pub fn is_empty(&self) -> bool {
        self.waiting_jobs.is_empty()
            && self.active_workers.is_empty()
            && self.waiting_results.is_empty()
            && self.completed_results.is_empty()
    }

    /// Whether the capacity policy forbids launching another worker.
    pub fn is_full(&self) -> bool {
        self.capacity.is_full(self.process_count())
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn waittime(&self) -> Duration {
        self.waittime
    }

    pub fn strategy(&self) -> Strategy {
        self.job_factory.strategy()
    }

    pub fn channel(&self) -> &Arc<dyn ResultChannel<T>> {
        &self.channel
    }

    pub fn carrier(&self) -> &StacktraceCarrier {
        &self.carrier
    }

    pub fn stats(&self) -> &ManagerStats {
        &self.stats
    }

    /// Give up the manager, keeping its channel.
    pub(crate) fn into_channel(self) -> Arc<dyn ResultChannel<T>> {
        self.channel
    }

    /// Hand a result to the caller. Failures with printable context become
    /// the carrier's last exception.
    pub(super) fn complete(&mut self, id: JobId, result: JobResult<T>) {
        if let Some(error) = result.err() {
            if error.stacktrace().is_some() {
                self.carrier.set_last_exception(error);
            }
        }
        self.stats.record_completion(&result);
        self.completed_results.push_back((id, result));
    }
}
