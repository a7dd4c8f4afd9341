//! PBS job and node types.

use std::fmt;

/// PBS job status (the single-letter `S` column of qstat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PbsJobState {
    /// Q - Job is queued
    Queued,
    /// R - Job is running
    Running,
    /// H - Job is held
    Held,
    /// W - Job is waiting for its execution time
    Waiting,
    /// E - Job is exiting after having run
    Exiting,
    /// C - Job is completed (kept in qstat for a while by Torque)
    Completed,
    /// T - Job is being moved
    Transit,
    /// S - Job is suspended
    Suspended,
    /// Unknown state
    Unknown(String),
}

impl PbsJobState {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "Q" => PbsJobState::Queued,
            "R" => PbsJobState::Running,
            "H" => PbsJobState::Held,
            "W" => PbsJobState::Waiting,
            "E" => PbsJobState::Exiting,
            "C" => PbsJobState::Completed,
            "T" => PbsJobState::Transit,
            "S" => PbsJobState::Suspended,
            other => PbsJobState::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for PbsJobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PbsJobState::Queued => "Q",
            PbsJobState::Running => "R",
            PbsJobState::Held => "H",
            PbsJobState::Waiting => "W",
            PbsJobState::Exiting => "E",
            PbsJobState::Completed => "C",
            PbsJobState::Transit => "T",
            PbsJobState::Suspended => "S",
            PbsJobState::Unknown(s) => s,
        };
        write!(f, "{}", s)
    }
}

/// PBS job information from `qstat -u`.
#[derive(Debug, Clone)]
pub struct PbsJob {
    /// PBS job ID (e.g. "12345.arthur")
    pub job_id: String,

    /// Owner
    pub user: String,

    /// Queue name
    pub queue: String,

    /// Job name (qstat truncates long names)
    pub name: String,

    /// Job state
    pub state: PbsJobState,

    /// Requested walltime as printed (e.g. "10:00")
    pub req_time: Option<String>,
}

/// One compute node from `pbsnodes -a`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PbsNode {
    pub name: String,
    /// Raw state (e.g. "free", "job-exclusive", "down,offline")
    pub state: String,
    /// Number of processors
    pub np: Option<u32>,
    /// Node properties in the order the server lists them
    pub properties: Vec<String>,
    /// Total memory from the mom status line, in kB
    pub total_memory_kb: Option<u64>,
}

impl PbsNode {
    /// Whether the node accepts or runs work.
    pub fn is_up(&self) -> bool {
        matches!(self.state.as_str(), "free" | "job-exclusive")
    }

    /// State for display: running nodes are "up", anything else is shown
    /// as reported with the "job-exclusive" part removed.
    pub fn display_state(&self) -> String {
        if self.is_up() {
            "up".to_string()
        } else {
            self.state
                .replace("job-exclusive", "")
                .trim_matches(',')
                .to_string()
        }
    }

    /// CPU model; the arthur server lists it as first property.
    pub fn cpu(&self) -> Option<&str> {
        self.properties.first().map(String::as_str)
    }

    /// OS image; the arthur server lists it as seventh property.
    pub fn os_version(&self) -> Option<&str> {
        self.properties.get(6).map(String::as_str)
    }

    /// Total memory in whole GB, truncated.
    pub fn total_memory_gb(&self) -> Option<u64> {
        self.total_memory_kb.map(|kb| kb / (1024 * 1024))
    }
}
