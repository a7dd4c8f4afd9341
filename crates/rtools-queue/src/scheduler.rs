//! Scheduler selection and a scheduler-neutral view of queued jobs.

use rtools_parsers::{CommandError, command_available};
use rtools_pbs::{PbsJob, PbsJobState, QstatError};
use rtools_slurm::{SlurmJob, SqueueError};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Batch system the current host talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    Pbs,
    Slurm,
}

impl FromStr for Scheduler {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pbs" | "torque" => Ok(Scheduler::Pbs),
            "slurm" => Ok(Scheduler::Slurm),
            other => Err(format!("unknown scheduler '{}' (expected pbs or slurm)", other)),
        }
    }
}

impl fmt::Display for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scheduler::Pbs => write!(f, "pbs"),
            Scheduler::Slurm => write!(f, "slurm"),
        }
    }
}

/// Detect the scheduler by probing its client tools, SLURM first.
pub async fn detect_scheduler() -> Option<Scheduler> {
    if command_available("squeue", "--version").await {
        tracing::debug!("detected SLURM");
        return Some(Scheduler::Slurm);
    }
    if command_available("qstat", "--version").await {
        tracing::debug!("detected PBS");
        return Some(Scheduler::Pbs);
    }
    None
}

/// One queued job, independent of the scheduler that reported it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    pub job_id: String,
    pub name: String,
    pub state: String,
    /// PBS queue or SLURM partition
    pub queue: Option<String>,
}

impl From<PbsJob> for QueuedJob {
    fn from(job: PbsJob) -> Self {
        Self {
            job_id: job.job_id,
            name: job.name,
            state: job.state.to_string(),
            queue: Some(job.queue),
        }
    }
}

impl From<SlurmJob> for QueuedJob {
    fn from(job: SlurmJob) -> Self {
        Self {
            job_id: job.job_id,
            name: job.name,
            state: job.state.to_string(),
            queue: job.partition,
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Pbs(#[from] QstatError),
    #[error(transparent)]
    Slurm(#[from] SqueueError),
}

impl QueryError {
    /// Exit status of the failed scheduler command, if it ran.
    pub fn status(&self) -> Option<i32> {
        match self {
            QueryError::Pbs(QstatError::Command(e)) => e.status(),
            QueryError::Slurm(SqueueError::Command(e)) => e.status(),
            _ => None,
        }
    }
}

/// Jobs still in the queue; Torque keeps finished jobs listed with state `C`.
pub fn pbs_queued_jobs(jobs: Vec<PbsJob>) -> Vec<QueuedJob> {
    jobs.into_iter()
        .filter(|job| job.state != PbsJobState::Completed)
        .map(QueuedJob::from)
        .collect()
}

impl Scheduler {
    /// List the queued jobs of `user`.
    pub async fn current_jobs(self, user: &str) -> Result<Vec<QueuedJob>, QueryError> {
        let jobs = match self {
            Scheduler::Pbs => pbs_queued_jobs(rtools_pbs::query_qstat(user).await?),
            Scheduler::Slurm => rtools_slurm::query_squeue(user)
                .await?
                .into_iter()
                .map(QueuedJob::from)
                .collect(),
        };
        Ok(jobs)
    }

    /// Full scheduler record of one job, unmodified.
    pub async fn show_job(self, job_id: &str) -> Result<String, CommandError> {
        match self {
            Scheduler::Pbs => rtools_pbs::show_job(job_id).await,
            Scheduler::Slurm => rtools_slurm::show_job(job_id).await,
        }
    }
}
