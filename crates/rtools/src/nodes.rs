//! `rtools nodes`: compute node inventory as a Markdown table.

use crate::failure::with_status;
use miette::Result;
use rtools_cli::{NodesArgs, RtoolsConfig};
use rtools_pbs::{PbsNode, PbsnodesError};
use rtools_queue::Scheduler;
use rtools_slurm::{SinfoError, SlurmNode};
use tabled::{Table, Tabled, settings::Style};

#[derive(Tabled, Debug, PartialEq, Eq)]
struct NodeRow {
    node: String,
    cores: String,
    cpu: String,
    #[tabled(rename = "os version")]
    os_version: String,
    ram: String,
    state: String,
    #[tabled(skip)]
    up: bool,
}

impl From<&PbsNode> for NodeRow {
    fn from(node: &PbsNode) -> Self {
        Self {
            node: node.name.clone(),
            cores: node.np.map(|np| np.to_string()).unwrap_or_default(),
            cpu: node.cpu().unwrap_or_default().to_string(),
            os_version: node.os_version().unwrap_or("no os_flag").to_string(),
            ram: ram_gb(node.total_memory_gb()),
            state: node.display_state(),
            up: node.is_up(),
        }
    }
}

impl From<&SlurmNode> for NodeRow {
    fn from(node: &SlurmNode) -> Self {
        let up = node.is_up();
        Self {
            node: node.name.clone(),
            cores: node.cpus.map(|cpus| cpus.to_string()).unwrap_or_default(),
            cpu: node.features.first().cloned().unwrap_or_default(),
            os_version: node
                .features
                .get(6)
                .cloned()
                .unwrap_or_else(|| "no os_flag".to_string()),
            ram: ram_gb(node.memory_mb.map(|mb| mb / 1024)),
            state: if up { "up".to_string() } else { node.state.clone() },
            up,
        }
    }
}

fn ram_gb(gb: Option<u64>) -> String {
    match gb {
        Some(gb) => format!("{} gb", gb),
        None => "???".to_string(),
    }
}

fn render(rows: &[NodeRow]) -> String {
    let online = rows.iter().filter(|row| row.up).count();
    format!(
        "{}\n\nCurrently online: {} / {} compute nodes.",
        Table::new(rows).with(Style::markdown()),
        online,
        rows.len()
    )
}

pub async fn run(args: NodesArgs, config: &RtoolsConfig) -> Result<i32> {
    let scheduler = crate::resolve_scheduler(args.scheduler, config).await?;

    let rows: Vec<NodeRow> = match scheduler {
        Scheduler::Pbs => {
            let nodes = with_status(rtools_pbs::query_pbsnodes().await, "pbsnodes", |e| match e {
                PbsnodesError::Command(e) => e.status(),
                _ => None,
            })?;
            nodes.iter().map(NodeRow::from).collect()
        }
        Scheduler::Slurm => {
            let nodes = with_status(rtools_slurm::query_sinfo().await, "sinfo", |e| match e {
                SinfoError::Command(e) => e.status(),
                _ => None,
            })?;
            nodes.iter().map(NodeRow::from).collect()
        }
    };

    println!("{}", render(&rows));
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pbs_node(name: &str, state: &str, mem_kb: Option<u64>) -> PbsNode {
        PbsNode {
            name: name.to_string(),
            state: state.to_string(),
            np: Some(16),
            properties: ["xeon", "ib", "a", "b", "c", "d", "jessie"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            total_memory_kb: mem_kb,
        }
    }

    #[test]
    fn test_pbs_row() {
        let row = NodeRow::from(&pbs_node("tick1", "job-exclusive", Some(65_970_000)));
        assert_eq!(row.cores, "16");
        assert_eq!(row.cpu, "xeon");
        assert_eq!(row.os_version, "jessie");
        assert_eq!(row.ram, "62 gb");
        assert_eq!(row.state, "up");

        let mut node = pbs_node("tick2", "down,offline", None);
        node.properties.truncate(2);
        let row = NodeRow::from(&node);
        assert_eq!(row.os_version, "no os_flag");
        assert_eq!(row.ram, "???");
        assert_eq!(row.state, "down,offline");
        assert!(!row.up);
    }

    #[test]
    fn test_slurm_row() {
        let node = SlurmNode {
            name: "lx01".to_string(),
            cpus: Some(28),
            memory_mb: Some(64_000),
            features: vec!["haswell".to_string()],
            state: "down*".to_string(),
        };
        let row = NodeRow::from(&node);
        assert_eq!(row.cpu, "haswell");
        assert_eq!(row.ram, "62 gb");
        assert_eq!(row.state, "down*");
    }

    #[test]
    fn test_render_counts_online() {
        let rows = vec![
            NodeRow::from(&pbs_node("tick1", "free", Some(32 * 1024 * 1024))),
            NodeRow::from(&pbs_node("tick2", "offline", None)),
        ];
        let out = render(&rows);
        assert!(out.starts_with("| node "));
        assert!(out.contains("| os version "));
        assert!(out.contains("32 gb"));
        assert!(out.ends_with("Currently online: 1 / 2 compute nodes."));
    }
}
