//! Submit job scripts via qsub.

use rtools_parsers::{CommandError, run_command};
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum QsubError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("qsub returned no job id")]
    MissingJobId,
}

/// qsub arguments; `dependency` is passed verbatim as `-W depend=<dependency>`.
pub fn qsub_args(script: &str, dependency: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(dep) = dependency {
        args.push("-W".to_string());
        args.push(format!("depend={}", dep));
    }
    args.push(script.to_string());
    args
}

/// Submit `script` with qsub from within `job_dir` and return the job id
/// exactly as qsub printed it (e.g. "123456.arthur").
pub async fn submit_qsub(
    job_dir: &Path,
    script: &str,
    dependency: Option<&str>,
) -> Result<String, QsubError> {
    let mut cmd = Command::new("qsub");
    cmd.current_dir(job_dir).args(qsub_args(script, dependency));

    tracing::debug!(?dependency, script, "running qsub in {}", job_dir.display());
    let stdout = run_command(&mut cmd, "qsub").await?;

    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .ok_or(QsubError::MissingJobId)
}
