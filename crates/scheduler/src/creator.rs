use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use jobpool_channel::{ChannelFactory, ProcessChannelFactory, ThreadChannelFactory};
use jobpool_core::{Capacity, SchedulerConfig, StacktraceCarrier, Strategy};
use jobpool_worker::{factory_for, JobFactory, ThreadFactory};

use crate::error::SchedulerResult;
use crate::manager::Manager;

/// Builds managers together with their result channels and tears both
/// down again.
pub struct Creator<T> {
    job_factory: Arc<dyn JobFactory>,
    channel_factory: Arc<dyn ChannelFactory<T>>,
    capacity: Capacity,
    waittime: Option<Duration>,
    carrier: Option<StacktraceCarrier>,
}

impl<T: Send + 'static> Creator<T> {
    pub fn new(
        job_factory: Arc<dyn JobFactory>,
        channel_factory: Arc<dyn ChannelFactory<T>>,
        capacity: Capacity,
    ) -> Self {
        Self {
            job_factory,
            channel_factory,
            capacity,
            waittime: None,
            carrier: None,
        }
    }

    /// Thread workers over an in-memory channel. Works for any `Send`
    /// result type.
    pub fn threads(capacity: Capacity) -> Self {
        Self::new(Arc::new(ThreadFactory::new()), Arc::new(ThreadChannelFactory), capacity)
    }

    pub fn waittime(mut self, waittime: Duration) -> Self {
        self.waittime = Some(waittime);
        self
    }

    pub fn carrier(mut self, carrier: StacktraceCarrier) -> Self {
        self.carrier = Some(carrier);
        self
    }

    /// Open a fresh channel and bind a new manager to it.
    pub fn create(&self) -> SchedulerResult<Manager<T>> {
        let channel = self.channel_factory.create()?;
        let mut manager = Manager::new(channel, Arc::clone(&self.job_factory), self.capacity);
        if let Some(waittime) = self.waittime {
            manager = manager.with_waittime(waittime);
        }
        if let Some(carrier) = &self.carrier {
            manager = manager.with_carrier(carrier.clone());
        }
        Ok(manager)
    }

    /// Terminate the manager, wait for its workers and release its
    /// channel.
    pub fn destroy(&self, mut manager: Manager<T>) {
        manager.terminate();
        manager.join();
        let stats = manager.stats().clone();
        self.channel_factory.destroy(manager.into_channel());
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            "manager destroyed"
        );
    }
}

impl<T> Creator<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Creator for a validated configuration. The channel kind follows
    /// the strategy.
    ///
    /// With [`Strategy::Process`] each result is one datagram of at most
    /// [`MAX_FRAME`](jobpool_channel::process::MAX_FRAME) bytes once encoded; larger
    /// values come back as a `RuntimeError` naming the delivery failure.
    pub fn from_config(config: &SchedulerConfig) -> SchedulerResult<Self> {
        config.validate()?;
        let channel_factory: Arc<dyn ChannelFactory<T>> = match config.strategy {
            Strategy::Thread => Arc::new(ThreadChannelFactory),
            Strategy::Process => Arc::new(ProcessChannelFactory),
        };
        let job_factory = factory_for(config.strategy, config.propagate_error_message);
        Ok(Self::new(job_factory, channel_factory, config.capacity).waittime(config.waittime()))
    }
}
