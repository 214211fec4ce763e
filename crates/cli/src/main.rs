mod cli;
mod config;
mod workload;

use anyhow::{bail, Context, Result};
use clap::Parser;

use crate::cli::{CliArgs, Command};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = CliArgs::parse();
    let path = args.config.as_deref();

    match args.command {
        Command::Run(run) => {
            let config = config::resolve(path, &run.overrides)?;
            config.log_summary();
            let report = workload::run(&config, &run)?;
            if report.failed > 0 {
                bail!("{} of {} jobs failed", report.failed, run.jobs);
            }
        }
        Command::Crash(crash) => {
            let config = config::resolve(path, &crash.overrides)?;
            config.log_summary();
            workload::crash(&config, &crash)?;
        }
        Command::Config(overrides) => {
            let config = config::resolve(path, &overrides)?;
            let text = config.to_toml().context("failed to render configuration")?;
            print!("{text}");
        }
    }
    Ok(())
}
