use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::ChannelError;
use crate::process::ProcessChannel;
use crate::thread::ThreadChannel;
use crate::traits::{ChannelFactory, ResultChannel};

/// Creates in-memory channels for thread workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadChannelFactory;

impl<T: Send + 'static> ChannelFactory<T> for ThreadChannelFactory {
    fn create(&self) -> Result<Arc<dyn ResultChannel<T>>, ChannelError> {
        debug!("creating thread channel");
        Ok(Arc::new(ThreadChannel::<T>::new()))
    }

    fn destroy(&self, channel: Arc<dyn ResultChannel<T>>) {
        debug!(holders = Arc::strong_count(&channel), "releasing thread channel");
    }
}

/// Creates socket-backed channels for forked workers.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessChannelFactory;

impl<T> ChannelFactory<T> for ProcessChannelFactory
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn create(&self) -> Result<Arc<dyn ResultChannel<T>>, ChannelError> {
        debug!("creating process channel");
        Ok(Arc::new(ProcessChannel::<T>::new()?))
    }

    fn destroy(&self, channel: Arc<dyn ResultChannel<T>>) {
        debug!(holders = Arc::strong_count(&channel), "releasing process channel");
    }
}
