//! `rtools myq`: report jobs that left the queue since the last call.

use crate::failure::with_status;
use camino::Utf8PathBuf;
use miette::{Result, miette};
use rtools_cli::{MyqArgs, RtoolsConfig};
use rtools_queue::{QueuedJob, RefreshError, Scheduler, SnapshotStore, refresh_from};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled)]
struct QueueRow {
    #[tabled(rename = "#")]
    index: usize,
    id: String,
    name: String,
    state: String,
    queue: String,
}

pub async fn run(args: MyqArgs, config: &RtoolsConfig) -> Result<i32> {
    let scheduler = crate::resolve_scheduler(args.scheduler, config).await?;
    let store = SnapshotStore::new(state_path(&args, config)?);

    let query = scheduler.current_jobs(&args.user).await;
    let mut jobs = query.as_ref().ok().cloned().unwrap_or_default();
    let diff = with_status(
        refresh_from(&store, query),
        list_command(scheduler),
        RefreshError::status,
    )?;

    for id in &diff.finished {
        println!("{}", id);
    }
    if !diff.new.is_empty() {
        tracing::info!("{} new job(s) in the queue", diff.new.len());
    }

    jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
    if args.list {
        println!("{}", queue_table(&jobs));
    }

    if let Some(index) = args.index {
        let job = select_job(&jobs, index)?;
        let record = with_status(
            scheduler.show_job(&job.job_id).await,
            show_command(scheduler),
            |e| e.status(),
        )?;
        print!("{}", record);
    }

    Ok(0)
}

fn list_command(scheduler: Scheduler) -> &'static str {
    match scheduler {
        Scheduler::Pbs => "qstat",
        Scheduler::Slurm => "squeue",
    }
}

fn show_command(scheduler: Scheduler) -> &'static str {
    match scheduler {
        Scheduler::Pbs => "qstat",
        Scheduler::Slurm => "scontrol",
    }
}

/// Snapshot file from `--state-file`, the config, or the per-user default.
fn state_path(args: &MyqArgs, config: &RtoolsConfig) -> Result<Utf8PathBuf> {
    let path = match args.state_file.clone().or_else(|| config.state_file()) {
        Some(path) => path,
        None => {
            return SnapshotStore::default_path(&args.user)
                .ok_or_else(|| miette!("Cannot determine the home directory; use --state-file"));
        }
    };
    Utf8PathBuf::from_path_buf(path)
        .map_err(|path| miette!("State file path is not valid UTF-8: {}", path.display()))
}

/// The `index`-th job, counting from 1.
fn select_job(jobs: &[QueuedJob], index: usize) -> Result<&QueuedJob> {
    index
        .checked_sub(1)
        .and_then(|i| jobs.get(i))
        .ok_or_else(|| miette!("No job #{} in the queue ({} queued)", index, jobs.len()))
}

fn queue_table(jobs: &[QueuedJob]) -> String {
    let rows = jobs.iter().enumerate().map(|(i, job)| QueueRow {
        index: i + 1,
        id: job.job_id.clone(),
        name: job.name.clone(),
        state: job.state.clone(),
        queue: job.queue.clone().unwrap_or_default(),
    });
    Table::new(rows).with(Style::markdown()).to_string()
}
