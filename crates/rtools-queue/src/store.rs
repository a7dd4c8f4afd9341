use crate::scheduler::{QueryError, QueuedJob};
use crate::snapshot::{JobSnapshot, QueueDiff};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RefreshError {
    /// Exit status of the failed scheduler command, if it ran.
    pub fn status(&self) -> Option<i32> {
        match self {
            RefreshError::Query(e) => e.status(),
            RefreshError::Store(_) => None,
        }
    }
}

/// Persistent storage for the last seen job snapshot.
///
/// The file holds one job ID per line and is overwritten on every save.
pub struct SnapshotStore {
    path: Utf8PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default per-user location: `~/.rtools/myq/<user>.jobs`.
    pub fn default_path(user: &str) -> Option<Utf8PathBuf> {
        let home = dirs::home_dir()?;
        let home = Utf8PathBuf::from_path_buf(home).ok()?;
        Some(home.join(".rtools").join("myq").join(format!("{}.jobs", user)))
    }

    /// Get the path to the state file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Load the saved snapshot.
    ///
    /// Returns an empty snapshot if the file doesn't exist.
    pub fn load(&self) -> Result<JobSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(JobSnapshot::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        Ok(JobSnapshot::from_ids(content.lines()))
    }

    /// Overwrite the saved snapshot.
    ///
    /// Creates parent directories if needed.
    pub fn save(&self, snapshot: &JobSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let mut content = String::new();
        for id in snapshot.iter() {
            content.push_str(id);
            content.push('\n');
        }
        fs::write(&self.path, content).map_err(|e| self.io_error(e))
    }

    /// Diff `current` against the saved snapshot, then save `current`.
    pub fn refresh(&self, current: JobSnapshot) -> Result<QueueDiff, StoreError> {
        let previous = self.load()?;
        let diff = QueueDiff::between(&previous, current);
        self.save(&diff.current)?;
        tracing::debug!(
            finished = diff.finished.len(),
            queued = diff.current.len(),
            "saved snapshot to {}",
            self.path
        );
        Ok(diff)
    }
}

/// Refresh the store from a scheduler query.
///
/// A failed query returns before anything is read or written, so the saved
/// snapshot keeps describing the last successful run.
pub fn refresh_from(
    store: &SnapshotStore,
    query: Result<Vec<QueuedJob>, QueryError>,
) -> Result<QueueDiff, RefreshError> {
    let jobs = query?;
    let current = JobSnapshot::from_ids(jobs.iter().map(|job| job.job_id.as_str()));
    Ok(store.refresh(current)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtools_slurm::SqueueError;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> SnapshotStore {
        let dir = Utf8Path::from_path(temp.path()).unwrap();
        SnapshotStore::new(dir.join("myq").join("alice.jobs"))
    }

    fn job(id: &str) -> QueuedJob {
        QueuedJob {
            job_id: id.to_string(),
            name: "job".to_string(),
            state: "R".to_string(),
            queue: None,
        }
    }

    #[test]
    fn test_store_load_nonexistent() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_store_save_and_load() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store
            .save(&JobSnapshot::from_ids(["2.arthur", "1.arthur"]))
            .unwrap();
        assert!(store.path().exists());
        assert_eq!(
            fs::read_to_string(store.path()).unwrap(),
            "1.arthur\n2.arthur\n"
        );

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("2.arthur"));
    }

    #[test]
    fn test_first_refresh_reports_nothing() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let diff = store.refresh(JobSnapshot::from_ids(["1", "2"])).unwrap();
        assert!(diff.finished.is_empty());
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn test_refresh_reports_and_overwrites() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.save(&JobSnapshot::from_ids(["1", "2", "3"])).unwrap();

        let diff = store.refresh(JobSnapshot::from_ids(["3", "4"])).unwrap();
        assert_eq!(diff.finished, vec!["1", "2"]);
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "3\n4\n");

        let again = store.refresh(JobSnapshot::from_ids(["3", "4"])).unwrap();
        assert!(again.finished.is_empty());
    }

    #[test]
    fn test_refresh_from_query() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.save(&JobSnapshot::from_ids(["1", "2"])).unwrap();

        let diff = refresh_from(&store, Ok(vec![job("2")])).unwrap();
        assert_eq!(diff.finished, vec!["1"]);
    }

    #[test]
    fn test_completed_pbs_job_is_reported_finished() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.save(&JobSnapshot::from_ids(["123456.arthur"])).unwrap();

        let stdout = "\
Job ID               Username Queue    Jobname          SessID NDS   TSK Memory Time  S Time
-------------------- -------- -------- ---------------- ------ ----- --- ------ ----- - -----
123456.arthur        alice    batch    h2o_relax         28211     1   8    --  10:00 C 01:23
";
        let jobs = rtools_pbs::parse_qstat_output(stdout).unwrap();
        let diff = refresh_from(&store, Ok(crate::pbs_queued_jobs(jobs))).unwrap();
        assert_eq!(diff.finished, vec!["123456.arthur"]);
        assert!(diff.current.is_empty());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "");
    }

    #[test]
    fn test_failed_query_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.save(&JobSnapshot::from_ids(["1", "2"])).unwrap();
        let before = fs::read_to_string(store.path()).unwrap();

        let query = Err(QueryError::Slurm(SqueueError::ParseError(
            "garbage".to_string(),
        )));
        assert!(matches!(
            refresh_from(&store, query),
            Err(RefreshError::Query(_))
        ));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), before);
    }
}
