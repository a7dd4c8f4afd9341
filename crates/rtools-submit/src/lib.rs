//! Submit agents for the group's batch clusters.
//!
//! An agent resolves its parameters (built-in defaults, defaults files,
//! command line), renders a scheduler-specific job script into the job
//! directory and hands it to the scheduler's submission command. Job IDs
//! are returned exactly as the scheduler printed them.

pub mod arthur;
pub mod defaults;
pub mod error;
pub mod linuxcluster;
pub mod params;
pub mod template;

pub use arthur::{ArthurJob, ArthurParams, MemorySetting};
pub use defaults::{DefaultsError, Overlay, load_defaults};
pub use error::SubmitError;
pub use linuxcluster::{Cluster, LinuxClusterJob, LinuxClusterParams};
pub use params::{Dependency, DependencyType, HostContext, WalltimeSetting};

use std::path::PathBuf;

/// Result of running a submit agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The job script that was written
    pub job_file: PathBuf,
    /// Job ID assigned by the scheduler; None for dry runs
    pub job_id: Option<String>,
    /// Cluster reported by sbatch, if any
    pub cluster: Option<String>,
    /// Exit status of the submission command (0 for dry runs)
    pub status: i32,
}

impl SubmitOutcome {
    pub(crate) fn dry_run(job_file: PathBuf) -> Self {
        Self {
            job_file,
            job_id: None,
            cluster: None,
            status: 0,
        }
    }

    pub(crate) fn submitted(job_file: PathBuf, job_id: String, cluster: Option<String>) -> Self {
        Self {
            job_file,
            job_id: Some(job_id),
            cluster,
            status: 0,
        }
    }
}
