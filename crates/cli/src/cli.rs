use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use jobpool_scheduler::{Capacity, Strategy};

/// Run synthetic workloads through the job scheduler.
///
/// Configuration is read from a TOML file (optional), then `JOBPOOL_*`
/// environment variables, then the flags given here.
#[derive(Parser, Debug)]
#[command(name = "jobpool", version, about)]
pub struct CliArgs {
    /// Scheduler configuration file.
    #[arg(long, global = true, env = "JOBPOOL_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a batch of jobs and print each result as it arrives.
    Run(RunArgs),
    /// Run process workers that die from a signal partway through.
    Crash(CrashArgs),
    /// Print the resolved scheduler configuration as TOML.
    Config(Overrides),
}

/// Flags that override the loaded configuration.
#[derive(Args, Debug, Default, Clone)]
pub struct Overrides {
    /// Concurrent workers: a count or "unlimited".
    #[arg(long)]
    pub capacity: Option<Capacity>,

    /// Worker strategy: thread or process.
    #[arg(long)]
    pub strategy: Option<Strategy>,

    /// Milliseconds between polls.
    #[arg(long)]
    pub waittime_ms: Option<u64>,

    /// Print thread worker failures to stderr as they happen.
    #[arg(long)]
    pub propagate_errors: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Number of jobs to submit.
    #[arg(long, default_value_t = 10)]
    pub jobs: usize,

    /// Every K-th job fails with a ValueError (0 disables).
    #[arg(long, default_value_t = 0)]
    pub fail_every: usize,

    /// Milliseconds each job sleeps before returning.
    #[arg(long, default_value_t = 50)]
    pub sleep_ms: u64,

    /// Re-raise the first failure with its captured context after the run.
    #[arg(long)]
    pub raise_first_error: bool,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Args, Debug)]
pub struct CrashArgs {
    /// Number of jobs to submit.
    #[arg(long, default_value_t = 6)]
    pub jobs: usize,

    /// Every K-th job aborts its worker process.
    #[arg(long, default_value_t = 3)]
    pub crash_every: usize,

    /// Milliseconds each job sleeps before returning.
    #[arg(long, default_value_t = 20)]
    pub sleep_ms: u64,

    #[command(flatten)]
    pub overrides: Overrides,
}
