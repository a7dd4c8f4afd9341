//! Query the user's queued SLURM jobs via squeue.

use crate::types::{SlurmJob, SlurmJobState};
use rtools_parsers::{CommandError, non_empty_string, run_command, split_delimited};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum SqueueError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Failed to parse squeue output: {0}")]
    ParseError(String),
}

/// squeue output format:
/// %i - Job ID
/// %j - Job name
/// %T - State (extended)
/// %P - Partition
const SQUEUE_FORMAT: &str = "%i|%j|%T|%P";

/// Parse a single line of squeue output.
fn parse_squeue_line(line: &str) -> Result<SlurmJob, SqueueError> {
    let fields = split_delimited(line, 4).map_err(SqueueError::ParseError)?;

    let job_id = fields[0].trim();
    if job_id.is_empty() {
        return Err(SqueueError::ParseError(format!("Missing job id: {}", line)));
    }

    Ok(SlurmJob {
        job_id: job_id.to_string(),
        name: fields[1].trim().to_string(),
        state: SlurmJobState::parse(fields[2]),
        partition: non_empty_string(fields[3]),
    })
}

/// Parse the complete squeue output.
///
/// Unlike a monitor, the caller diffs this against persisted state, so any
/// malformed line fails the whole parse instead of being skipped.
pub fn parse_squeue_output(stdout: &str) -> Result<Vec<SlurmJob>, SqueueError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(parse_squeue_line)
        .collect()
}

/// Query the queued jobs of `user` with squeue.
pub async fn query_squeue(user: &str) -> Result<Vec<SlurmJob>, SqueueError> {
    let mut cmd = Command::new("squeue");
    cmd.args(["-u", user, "-h", "-o", SQUEUE_FORMAT]);

    tracing::debug!(user, "querying squeue");
    let stdout = run_command(&mut cmd, "squeue").await?;
    parse_squeue_output(&stdout)
}
