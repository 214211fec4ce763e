use std::collections::HashMap;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use tracing::info;

use jobpool_scheduler::{Creator, JobError, JobId, SchedulerConfig, StacktraceCarrier, Strategy};

use crate::cli::{CrashArgs, RunArgs};

/// Outcome counts for one workload.
#[derive(Debug, Default)]
pub struct Report {
    pub succeeded: usize,
    pub failed: usize,
    pub first_error: Option<JobError>,
}

/// Submit `args.jobs` jobs; job `i` returns `i * i` after sleeping, and
/// every `fail_every`-th job fails instead.
pub fn run(config: &SchedulerConfig, args: &RunArgs) -> Result<Report> {
    let carrier = StacktraceCarrier::new();
    if args.raise_first_error {
        carrier.enable();
    }

    let creator = Creator::<u64>::from_config(config)?.carrier(carrier.clone());
    let mut manager = creator.create()?;
    let sleep = Duration::from_millis(args.sleep_ms);
    let fail_every = args.fail_every;

    let started = Instant::now();
    let mut index = HashMap::new();
    for i in 0..args.jobs {
        let id = manager.submit(move || {
            thread::sleep(sleep);
            if fail_every > 0 && (i + 1) % fail_every == 0 {
                return Err(JobError::new("ValueError", format!("job {i} refused")));
            }
            Ok((i * i) as u64)
        });
        index.insert(id, i);
    }
    info!(jobs = args.jobs, capacity = %config.capacity, strategy = %config.strategy, "submitted");

    let mut report = Report::default();
    for (id, result) in manager.results() {
        let label = label(&index, id);
        match result.into_result() {
            Ok(value) => {
                report.succeeded += 1;
                println!("{label}: ok {value}");
            }
            Err(error) => {
                report.failed += 1;
                println!("{label}: failed {}", error.summary());
                report.first_error.get_or_insert(error);
            }
        }
    }

    println!(
        "{} succeeded, {} failed in {:.2?} (avg run {:.2?})",
        report.succeeded,
        report.failed,
        started.elapsed(),
        manager.stats().avg_run_time,
    );
    creator.destroy(manager);

    if args.raise_first_error {
        if let Some(error) = report.first_error.take() {
            carrier.raise(error);
        }
        carrier.disable();
    }
    Ok(report)
}

/// Process workers where every `crash_every`-th job aborts. The manager
/// reports those jobs as `RuntimeError("exit code = -6")`.
pub fn crash(config: &SchedulerConfig, args: &CrashArgs) -> Result<Report> {
    if config.strategy != Strategy::Process {
        bail!("crash needs --strategy process: a thread worker would take the whole program down");
    }
    if args.crash_every == 0 {
        bail!("--crash-every must be at least 1");
    }

    let creator = Creator::<u64>::from_config(config)?;
    let mut manager = creator.create()?;
    let sleep = Duration::from_millis(args.sleep_ms);
    let crash_every = args.crash_every;

    let mut index = HashMap::new();
    for i in 0..args.jobs {
        let id = manager.submit(move || {
            thread::sleep(sleep);
            if (i + 1) % crash_every == 0 {
                std::process::abort();
            }
            Ok(i as u64)
        });
        index.insert(id, i);
    }

    let mut report = Report::default();
    for (id, result) in manager.results() {
        let label = label(&index, id);
        match result.into_result() {
            Ok(value) => {
                report.succeeded += 1;
                println!("{label}: ok {value}");
            }
            Err(error) => {
                report.failed += 1;
                println!("{label}: {}", error.summary());
            }
        }
    }
    println!(
        "{} survived, {} crashed",
        report.succeeded,
        manager.stats().crashed
    );
    creator.destroy(manager);
    Ok(report)
}

fn label(index: &HashMap<JobId, usize>, id: JobId) -> String {
    match index.get(&id) {
        Some(i) => format!("job #{i} [{}]", id.short()),
        None => format!("job [{}]", id.short()),
    }
}
