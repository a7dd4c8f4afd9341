//! SLURM job and node types.

use std::fmt;

/// SLURM job status as reported by squeue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlurmJobState {
    Pending,
    Running,
    Completing,
    Suspended,
    Configuring,
    Unknown(String),
}

impl SlurmJobState {
    /// Parse SLURM state string (long or compact form).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PENDING" | "PD" => SlurmJobState::Pending,
            "RUNNING" | "R" => SlurmJobState::Running,
            "COMPLETING" | "CG" => SlurmJobState::Completing,
            "SUSPENDED" | "S" => SlurmJobState::Suspended,
            "CONFIGURING" | "CF" => SlurmJobState::Configuring,
            other => SlurmJobState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for SlurmJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlurmJobState::Pending => write!(f, "PENDING"),
            SlurmJobState::Running => write!(f, "RUNNING"),
            SlurmJobState::Completing => write!(f, "COMPLETING"),
            SlurmJobState::Suspended => write!(f, "SUSPENDED"),
            SlurmJobState::Configuring => write!(f, "CONFIGURING"),
            SlurmJobState::Unknown(s) => write!(f, "{}", s),
        }
    }
}

/// SLURM job information from squeue.
#[derive(Debug, Clone)]
pub struct SlurmJob {
    /// SLURM job ID
    pub job_id: String,

    /// Job name
    pub name: String,

    /// Job state
    pub state: SlurmJobState,

    /// Partition
    pub partition: Option<String>,
}

/// One compute node as reported by `sinfo -N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlurmNode {
    pub name: String,
    pub cpus: Option<u32>,
    /// Real memory in MB
    pub memory_mb: Option<u64>,
    /// Active features, in the order sinfo lists them
    pub features: Vec<String>,
    /// Raw state (e.g. "idle", "mixed", "down*")
    pub state: String,
}

impl SlurmNode {
    /// Whether the node accepts or runs work.
    ///
    /// A trailing `*` (not responding) counts as down; other state flags are ignored.
    pub fn is_up(&self) -> bool {
        let base = self.state.trim_end_matches(['~', '#', '!', '%', '$', '@', '^', '-', '+']);
        matches!(base, "idle" | "mixed" | "allocated" | "completing")
    }
}
