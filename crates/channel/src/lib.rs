//! Result channels: the only path by which workers report back to the
//! manager.
//!
//! Two implementations ship with the crate:
//! - [`ThreadChannel`] for thread workers, an in-memory MPMC queue;
//! - [`ProcessChannel`] for forked workers, MessagePack [`Envelope`]s sent
//!   as datagrams over a Unix socket pair.
//!
//! A [`ChannelFactory`] creates and releases channels as a paired resource.

pub mod error;
pub mod factory;
pub mod message;
pub mod process;
pub mod thread;
pub mod traits;

pub use error::ChannelError;
pub use factory::{ProcessChannelFactory, ThreadChannelFactory};
pub use message::Envelope;
pub use process::ProcessChannel;
pub use thread::ThreadChannel;
pub use traits::{ChannelFactory, ResultChannel};
