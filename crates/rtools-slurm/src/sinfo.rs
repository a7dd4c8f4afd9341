//! Query compute nodes via sinfo.

use crate::types::SlurmNode;
use rtools_parsers::{
    CommandError, MemoryFormat, non_empty_string, parse_memory_mb, run_command, split_delimited,
};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum SinfoError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Failed to parse sinfo output: {0}")]
    ParseError(String),
}

/// sinfo node-oriented format:
/// %N - Node name
/// %c - CPUs
/// %m - Memory (MB)
/// %f - Features
/// %T - State (extended)
const SINFO_FORMAT: &str = "%N|%c|%m|%f|%T";

fn parse_sinfo_line(line: &str) -> Result<SlurmNode, SinfoError> {
    let fields = split_delimited(line, 5).map_err(SinfoError::ParseError)?;

    let features = non_empty_string(fields[3])
        .map(|f| f.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    Ok(SlurmNode {
        name: fields[0].trim().to_string(),
        cpus: fields[1].trim().parse().ok(),
        memory_mb: parse_memory_mb(fields[2], MemoryFormat::Slurm),
        features,
        state: fields[4].trim().to_string(),
    })
}

/// Parse `sinfo -N` output.
///
/// A node in several partitions is listed once per partition; duplicates are
/// dropped keeping the first occurrence.
pub fn parse_sinfo_output(stdout: &str) -> Result<Vec<SlurmNode>, SinfoError> {
    let mut nodes: Vec<SlurmNode> = Vec::new();
    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let node = parse_sinfo_line(line)?;
        if !nodes.iter().any(|n| n.name == node.name) {
            nodes.push(node);
        }
    }
    Ok(nodes)
}

/// List all compute nodes with sinfo.
pub async fn query_sinfo() -> Result<Vec<SlurmNode>, SinfoError> {
    let mut cmd = Command::new("sinfo");
    cmd.args(["-N", "-h", "-o", SINFO_FORMAT]);

    let stdout = run_command(&mut cmd, "sinfo").await?;
    parse_sinfo_output(&stdout)
}
