//! rtools - lab tools for the group's batch clusters.

mod build;
mod failure;
mod mensa;
mod myq;
mod nodes;
mod submit;

use clap::Parser;
use miette::{IntoDiagnostic, Result, miette};
use rtools_cli::{Args, Command, RtoolsConfig};
use rtools_queue::Scheduler;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(status) => ExitCode::from(exit_code(status)),
        Err(report) => {
            eprintln!("{:?}", report);
            ExitCode::from(exit_code(failure::exit_status(&report)))
        }
    }
}

/// Map a command status onto a process exit code; 0 never stands for failure.
fn exit_code(status: i32) -> u8 {
    match u8::try_from(status) {
        Ok(0) | Err(_) => 1,
        Ok(code) => code,
    }
}

/// Log to stderr; `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> Result<i32> {
    let config = RtoolsConfig::load(args.config.as_deref()).into_diagnostic()?;

    match args.command {
        Command::Myq(myq) => myq::run(myq, &config).await,
        Command::Submit(submit) => submit::run(submit).await,
        Command::Nodes(nodes) => nodes::run(nodes, &config).await,
        Command::Mensa(mensa) => mensa::run(mensa, &config).await,
        Command::Build(build) => build::run(build).await,
    }
}

/// Scheduler from the command line, the config file, or whatever is installed.
async fn resolve_scheduler(flag: Option<Scheduler>, config: &RtoolsConfig) -> Result<Scheduler> {
    if let Some(scheduler) = flag.or(config.scheduler) {
        return Ok(scheduler);
    }
    rtools_queue::detect_scheduler()
        .await
        .ok_or_else(|| miette!("No scheduler found (neither squeue nor qstat); use --scheduler"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code() {
        assert_eq!(exit_code(2), 2);
        assert_eq!(exit_code(0), 1);
        assert_eq!(exit_code(-1), 1);
        assert_eq!(exit_code(300), 1);
    }

    #[tokio::test]
    async fn test_resolve_scheduler_prefers_flag() {
        let config = RtoolsConfig {
            scheduler: Some(Scheduler::Pbs),
            ..Default::default()
        };
        assert_eq!(
            resolve_scheduler(Some(Scheduler::Slurm), &config).await.unwrap(),
            Scheduler::Slurm
        );
        assert_eq!(resolve_scheduler(None, &config).await.unwrap(), Scheduler::Pbs);
    }
}
