use std::path::Path;

use anyhow::{Context, Result};

use jobpool_scheduler::SchedulerConfig;

use crate::cli::Overrides;

/// File (or defaults), then environment, then flags.
pub fn resolve(path: Option<&Path>, overrides: &Overrides) -> Result<SchedulerConfig> {
    let mut config = match path {
        Some(path) => SchedulerConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SchedulerConfig::from_env().context("invalid JOBPOOL_* environment")?,
    };
    apply(&mut config, overrides);
    config.validate().context("invalid scheduler configuration")?;
    Ok(config)
}

fn apply(config: &mut SchedulerConfig, overrides: &Overrides) {
    if let Some(capacity) = overrides.capacity {
        config.capacity = capacity;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy;
    }
    if let Some(waittime_ms) = overrides.waittime_ms {
        config.waittime_ms = waittime_ms;
    }
    if overrides.propagate_errors {
        config.propagate_error_message = true;
    }
}
