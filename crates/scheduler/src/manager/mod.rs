//! Job manager -- queues jobs, drives workers and collects results.
//!
//! Split into focused submodules:
//! - `core`: Manager struct, constructor, submission and accessors
//! - `polling`: the reap / dispatch / drain cycle
//! - `lifecycle`: shutdown, resume, join and terminate
//! - `results`: the blocking result iterator

mod core;
mod lifecycle;
mod polling;
mod results;

pub use self::core::Manager;
pub use self::results::Results;
