use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::capacity::Capacity;
use crate::error::CoreError;

/// How workers are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// One OS thread per job, sharing the manager's address space.
    #[default]
    Thread,
    /// One forked child process per job. Results must be serializable.
    Process,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Thread => f.write_str("thread"),
            Self::Process => f.write_str("process"),
        }
    }
}

impl FromStr for Strategy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thread" | "threads" => Ok(Self::Thread),
            "process" | "processes" => Ok(Self::Process),
            other => Err(CoreError::InvalidStrategy(other.to_string())),
        }
    }
}

// ── SchedulerConfig ─────────────────────────────────────────────────

/// Scheduler configuration, typically parsed from TOML.
///
/// ```toml
/// capacity = 4            # or "unlimited"
/// waittime_ms = 10
/// strategy = "process"
/// propagate_error_message = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Maximum number of concurrently running workers.
    #[serde(default)]
    pub capacity: Capacity,
    /// Sleep between polls, also used as the result-channel receive timeout.
    #[serde(default = "default_waittime_ms")]
    pub waittime_ms: u64,
    /// Thread or process workers.
    #[serde(default)]
    pub strategy: Strategy,
    /// Print a thread worker's failure to stderr as soon as it happens.
    #[serde(default)]
    pub propagate_error_message: bool,
}

fn default_waittime_ms() -> u64 {
    10
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            capacity: Capacity::default(),
            waittime_ms: default_waittime_ms(),
            strategy: Strategy::default(),
            propagate_error_message: false,
        }
    }
}

impl SchedulerConfig {
    /// Parse config from a TOML string, then apply environment overrides.
    pub fn from_toml(toml_str: &str) -> Result<Self, CoreError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, CoreError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn waittime(&self) -> Duration {
        Duration::from_millis(self.waittime_ms)
    }

    pub fn to_toml(&self) -> Result<String, CoreError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.waittime_ms == 0 {
            return Err(CoreError::Config("waittime_ms must be greater than zero".into()));
        }
        if self.capacity == Capacity::Limited(0) {
            return Err(CoreError::InvalidCapacity(
                "limited capacity must allow at least one worker".into(),
            ));
        }
        Ok(())
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Scheduler config:");
        tracing::info!("  capacity:    {}", self.capacity);
        tracing::info!("  strategy:    {}", self.strategy);
        tracing::info!("  waittime:    {}ms", self.waittime_ms);
        tracing::info!("  propagate:   {}", self.propagate_error_message);
    }

    // ── Environment variable overrides ──────────────────────────────

    /// Apply environment variable overrides.
    ///
    /// - `JOBPOOL_CAPACITY` -> `capacity` (`"unlimited"` or a count)
    /// - `JOBPOOL_WAITTIME_MS` -> `waittime_ms`
    /// - `JOBPOOL_STRATEGY` -> `strategy`
    /// - `JOBPOOL_PROPAGATE_ERRORS` -> `propagate_error_message`
    ///
    /// Unparseable values are ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| env::var(key).ok().filter(|v| !v.is_empty()));
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("JOBPOOL_CAPACITY") {
            match v.parse() {
                Ok(capacity) => self.capacity = capacity,
                Err(e) => tracing::warn!(value = %v, "ignoring JOBPOOL_CAPACITY: {e}"),
            }
        }
        if let Some(v) = lookup("JOBPOOL_WAITTIME_MS") {
            match v.parse() {
                Ok(ms) => self.waittime_ms = ms,
                Err(e) => tracing::warn!(value = %v, "ignoring JOBPOOL_WAITTIME_MS: {e}"),
            }
        }
        if let Some(v) = lookup("JOBPOOL_STRATEGY") {
            match v.parse() {
                Ok(strategy) => self.strategy = strategy,
                Err(e) => tracing::warn!(value = %v, "ignoring JOBPOOL_STRATEGY: {e}"),
            }
        }
        if let Some(v) = lookup("JOBPOOL_PROPAGATE_ERRORS") {
            self.propagate_error_message = matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
    }
}
