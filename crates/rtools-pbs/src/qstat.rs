//! Query the user's PBS jobs via qstat.

use crate::types::{PbsJob, PbsJobState};
use rtools_parsers::{CommandError, non_empty_string, run_command};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum QstatError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Failed to parse qstat output: {0}")]
    ParseError(String),
}

/// Columns of `qstat -u` rows:
/// Job ID, Username, Queue, Jobname, SessID, NDS, TSK, Req'd Memory,
/// Req'd Time, S, Elap Time
const QSTAT_COLUMNS: usize = 11;

/// The header block ends with a line made only of dashes and blanks.
fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.starts_with('-') && trimmed.chars().all(|c| c == '-' || c == ' ')
}

/// Parse a single job row.
fn parse_qstat_row(line: &str) -> Result<PbsJob, QstatError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < QSTAT_COLUMNS {
        return Err(QstatError::ParseError(format!(
            "Expected {} fields, got {}: {}",
            QSTAT_COLUMNS,
            fields.len(),
            line
        )));
    }

    Ok(PbsJob {
        job_id: fields[0].to_string(),
        user: fields[1].to_string(),
        queue: fields[2].to_string(),
        name: fields[3].to_string(),
        state: PbsJobState::parse(fields[9]),
        req_time: non_empty_string(fields[8]),
    })
}

/// Parse `qstat -u <user>` output.
///
/// Empty output means no jobs. Any other output must contain the dashed
/// header separator, and every row after it must be a complete job row.
pub fn parse_qstat_output(stdout: &str) -> Result<Vec<PbsJob>, QstatError> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut lines = stdout.lines();
    if !lines.by_ref().any(is_separator) {
        return Err(QstatError::ParseError(format!(
            "No header separator in: {}",
            stdout.lines().next().unwrap_or_default()
        )));
    }

    lines
        .filter(|line| !line.trim().is_empty())
        .map(parse_qstat_row)
        .collect()
}

/// Query the jobs of `user` with qstat.
pub async fn query_qstat(user: &str) -> Result<Vec<PbsJob>, QstatError> {
    let mut cmd = Command::new("qstat");
    cmd.args(["-u", user]);

    tracing::debug!(user, "querying qstat");
    let stdout = run_command(&mut cmd, "qstat").await?;
    parse_qstat_output(&stdout)
}

/// Return `qstat -f <id>` output unchanged.
pub async fn show_job(job_id: &str) -> Result<String, CommandError> {
    let mut cmd = Command::new("qstat");
    cmd.args(["-f", job_id]);
    run_command(&mut cmd, "qstat").await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "
arthur.theo.chemie.tu-muenchen.de:
                                                                         Req'd  Req'd   Elap
Job ID               Username Queue    Jobname          SessID NDS   TSK Memory Time  S Time
-------------------- -------- -------- ---------------- ------ ----- --- ------ ----- - -----
123456.arthur        rittmeye batch    h2o_relax         28211     1   8    --  10:00 R 01:23
123457.arthur        rittmeye batch    md_300K             --      1   8    --  48:00 Q   --
";

    #[test]
    fn test_parse_qstat_output() {
        let jobs = parse_qstat_output(SAMPLE).unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].job_id, "123456.arthur");
        assert_eq!(jobs[0].user, "rittmeye");
        assert_eq!(jobs[0].name, "h2o_relax");
        assert_eq!(jobs[0].state, PbsJobState::Running);
        assert_eq!(jobs[0].req_time, Some("10:00".to_string()));
        assert_eq!(jobs[1].state, PbsJobState::Queued);
    }

    #[test]
    fn test_parse_qstat_no_jobs() {
        assert!(parse_qstat_output("").unwrap().is_empty());
        assert!(parse_qstat_output("\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_qstat_without_header_fails() {
        let err = parse_qstat_output("qstat: cannot connect to server arthur (errno=111)\n");
        assert!(matches!(err, Err(QstatError::ParseError(_))));
    }

    #[test]
    fn test_parse_qstat_short_row_fails() {
        let out = format!("{}123458.arthur rittmeye batch\n", SAMPLE);
        assert!(matches!(
            parse_qstat_output(&out),
            Err(QstatError::ParseError(_))
        ));
    }
}
