//! PBS/Torque integration for rtools.
//!
//! List jobs via qstat, submit via qsub, inspect nodes via pbsnodes.

pub mod pbsnodes;
pub mod qstat;
pub mod qsub;
pub mod types;

pub use pbsnodes::{PbsnodesError, parse_pbsnodes_output, query_pbsnodes};
pub use qstat::{QstatError, parse_qstat_output, query_qstat, show_job};
pub use qsub::{QsubError, qsub_args, submit_qsub};
pub use types::{PbsJob, PbsJobState, PbsNode};
