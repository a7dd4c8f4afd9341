//! Submit job scripts via sbatch.

use once_cell::sync::Lazy;
use regex::Regex;
use rtools_parsers::{CommandError, run_command};
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum SbatchError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Unexpected sbatch output: {0}")]
    UnexpectedOutput(String),
}

/// "Submitted batch job 4711" or "Submitted batch job 4711 on cluster mpp2"
static SUBMITTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Submitted batch job (\d+)(?: on cluster (\w+))?").expect("valid regex")
});

/// Result of a successful sbatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SbatchSubmission {
    pub job_id: String,
    pub cluster: Option<String>,
}

/// Extract job id and cluster from sbatch's stdout.
pub fn parse_sbatch_output(stdout: &str) -> Result<SbatchSubmission, SbatchError> {
    let caps = SUBMITTED_RE
        .captures(stdout)
        .ok_or_else(|| SbatchError::UnexpectedOutput(stdout.trim().to_string()))?;

    Ok(SbatchSubmission {
        job_id: caps[1].to_string(),
        cluster: caps.get(2).map(|m| m.as_str().to_string()),
    })
}

/// sbatch arguments; `dependency` is passed verbatim after `--dependency=`.
pub fn sbatch_args(script: &str, dependency: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(dep) = dependency {
        args.push(format!("--dependency={}", dep));
    }
    args.push(script.to_string());
    args
}

/// Submit `script` with sbatch from within `job_dir`.
pub async fn submit_sbatch(
    job_dir: &Path,
    script: &str,
    dependency: Option<&str>,
) -> Result<SbatchSubmission, SbatchError> {
    let mut cmd = Command::new("sbatch");
    cmd.current_dir(job_dir).args(sbatch_args(script, dependency));

    tracing::debug!(?dependency, script, "running sbatch in {}", job_dir.display());
    let stdout = run_command(&mut cmd, "sbatch").await?;
    parse_sbatch_output(&stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sbatch_with_cluster() {
        let sub = parse_sbatch_output("Submitted batch job 4711 on cluster mpp2\n").unwrap();
        assert_eq!(sub.job_id, "4711");
        assert_eq!(sub.cluster, Some("mpp2".to_string()));
    }

    #[test]
    fn test_parse_sbatch_plain() {
        let sub = parse_sbatch_output("Submitted batch job 123\n").unwrap();
        assert_eq!(sub.job_id, "123");
        assert!(sub.cluster.is_none());
    }

    #[test]
    fn test_sbatch_args_with_dependency() {
        assert_eq!(
            sbatch_args("job.md.linuxcluster", Some("afterany:7")),
            vec!["--dependency=afterany:7", "job.md.linuxcluster"]
        );
        assert_eq!(
            sbatch_args("job.md.linuxcluster", Some("afterok:1:2")),
            vec!["--dependency=afterok:1:2", "job.md.linuxcluster"]
        );
    }

    #[test]
    fn test_sbatch_args_without_dependency() {
        assert_eq!(sbatch_args("job.md.linuxcluster", None), vec!["job.md.linuxcluster"]);
    }

    #[test]
    fn test_parse_sbatch_garbage() {
        assert!(matches!(
            parse_sbatch_output("sbatch: error: invalid partition"),
            Err(SbatchError::UnexpectedOutput(_))
        ));
    }
}
