//! Query compute nodes via pbsnodes.

use crate::types::PbsNode;
use rtools_parsers::{CommandError, MemoryFormat, parse_memory_mb, run_command};
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum PbsnodesError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Failed to parse pbsnodes output: {0}")]
    ParseError(String),
}

/// Extract `totmem` (in kB) from the comma-separated mom status line.
fn parse_total_memory_kb(status: &str) -> Option<u64> {
    let mem = status
        .split(',')
        .find_map(|entry| entry.trim().strip_prefix("totmem="))?
        .trim()
        .to_lowercase();

    match mem.strip_suffix("kb") {
        Some(kb) => kb.parse().ok(),
        None => parse_memory_mb(&mem, MemoryFormat::Pbs).map(|mb| mb * 1024),
    }
}

/// Apply one `key = value` attribute line to `node`.
fn apply_attribute(node: &mut PbsNode, key: &str, value: &str) {
    match key {
        "state" => node.state = value.to_string(),
        "np" => node.np = value.parse().ok(),
        "properties" => {
            node.properties = value
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect();
        }
        "status" => node.total_memory_kb = parse_total_memory_kb(value),
        _ => {}
    }
}

/// Parse `pbsnodes -a` output: an unindented node name followed by
/// indented `key = value` lines, blocks separated by blank lines.
pub fn parse_pbsnodes_output(stdout: &str) -> Result<Vec<PbsNode>, PbsnodesError> {
    let mut nodes = Vec::new();
    let mut current: Option<PbsNode> = None;

    for line in stdout.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if !line.starts_with(char::is_whitespace) {
            if let Some(node) = current.take() {
                nodes.push(node);
            }
            current = Some(PbsNode {
                name: line.trim().to_string(),
                ..Default::default()
            });
            continue;
        }

        let node = current.as_mut().ok_or_else(|| {
            PbsnodesError::ParseError(format!("Attribute before node name: {}", line.trim()))
        })?;
        if let Some((key, value)) = line.split_once('=') {
            apply_attribute(node, key.trim(), value.trim());
        }
    }

    if let Some(node) = current.take() {
        nodes.push(node);
    }

    Ok(nodes)
}

/// List all compute nodes with pbsnodes.
pub async fn query_pbsnodes() -> Result<Vec<PbsNode>, PbsnodesError> {
    let mut cmd = Command::new("pbsnodes");
    cmd.arg("-a");

    let stdout = run_command(&mut cmd, "pbsnodes").await?;
    parse_pbsnodes_output(&stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
tick1
     state = free
     np = 8
     properties = Intel,XeonE5640,em64t,x86_64,xeon,smp,jessie
     ntype = cluster
     status = rectime=1490000000,ncpus=8,physmem=24689044kb,totmem=24689044kb,idletime=12,opsys=linux
     mom_service_port = 15002

tick2
     state = down,offline
     np = 16
     properties = AMD,Opteron6272
     ntype = cluster

";

    #[test]
    fn test_parse_pbsnodes_output() {
        let nodes = parse_pbsnodes_output(SAMPLE).unwrap();
        assert_eq!(nodes.len(), 2);

        assert_eq!(nodes[0].name, "tick1");
        assert_eq!(nodes[0].np, Some(8));
        assert_eq!(nodes[0].cpu(), Some("Intel"));
        assert_eq!(nodes[0].os_version(), Some("jessie"));
        assert_eq!(nodes[0].total_memory_kb, Some(24_689_044));
        assert!(nodes[0].is_up());

        assert_eq!(nodes[1].np, Some(16));
        assert_eq!(nodes[1].os_version(), None);
        assert_eq!(nodes[1].total_memory_kb, None);
        assert_eq!(nodes[1].display_state(), "down,offline");
    }

    #[test]
    fn test_parse_total_memory() {
        assert_eq!(parse_total_memory_kb("ncpus=8,totmem=1024kb"), Some(1024));
        assert_eq!(parse_total_memory_kb("ncpus=8"), None);
    }

    #[test]
    fn test_attribute_without_node_fails() {
        assert!(parse_pbsnodes_output("     state = free\n").is_err());
    }
}
