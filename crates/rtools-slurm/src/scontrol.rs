//! Full job records via scontrol.

use rtools_parsers::{CommandError, run_command};
use tokio::process::Command;

/// Return `scontrol show job <id>` output unchanged.
pub async fn show_job(job_id: &str) -> Result<String, CommandError> {
    let mut cmd = Command::new("scontrol");
    cmd.args(["show", "job", job_id]);
    run_command(&mut cmd, "scontrol").await
}
