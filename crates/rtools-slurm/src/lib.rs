//! SLURM integration for rtools.
//!
//! List jobs via squeue, submit via sbatch, inspect nodes via sinfo.

pub mod sbatch;
pub mod scontrol;
pub mod sinfo;
pub mod squeue;
pub mod types;

pub use sbatch::{SbatchError, SbatchSubmission, parse_sbatch_output, sbatch_args, submit_sbatch};
pub use scontrol::show_job;
pub use sinfo::{SinfoError, query_sinfo};
pub use squeue::{SqueueError, query_squeue};
pub use types::{SlurmJob, SlurmJobState, SlurmNode};
