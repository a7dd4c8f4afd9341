//! Queue snapshots for rtools.
//!
//! Remembers which jobs a user had queued and reports the ones that have
//! left the queue since the last look.

pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use scheduler::{QueryError, QueuedJob, Scheduler, detect_scheduler, pbs_queued_jobs};
pub use snapshot::{JobSnapshot, QueueDiff};
pub use store::{RefreshError, SnapshotStore, StoreError, refresh_from};
