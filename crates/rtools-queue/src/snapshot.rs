use std::collections::BTreeSet;

/// The set of job IDs a user had in the queue at one point in time.
///
/// IDs are opaque; two jobs are the same job iff their IDs are equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSnapshot {
    ids: BTreeSet<String>,
}

impl JobSnapshot {
    /// Build a snapshot, trimming IDs and ignoring empty ones.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids = ids
            .into_iter()
            .map(|id| id.as_ref().trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        Self { ids }
    }

    /// Jobs that were queued in `previous` but are gone now.
    pub fn finished_since(&self, previous: &JobSnapshot) -> Vec<String> {
        previous.ids.difference(&self.ids).cloned().collect()
    }

    /// Jobs that are queued now but were not in `previous`.
    pub fn started_since(&self, previous: &JobSnapshot) -> Vec<String> {
        self.ids.difference(&previous.ids).cloned().collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// IDs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

/// Outcome of comparing the current queue against the saved snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDiff {
    /// Left the queue since the last run (sorted)
    pub finished: Vec<String>,
    /// Entered the queue since the last run (sorted)
    pub new: Vec<String>,
    /// Everything queued right now
    pub current: JobSnapshot,
}

impl QueueDiff {
    pub fn between(previous: &JobSnapshot, current: JobSnapshot) -> Self {
        Self {
            finished: current.finished_since(previous),
            new: current.started_since(previous),
            current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ids_trims_and_dedups() {
        let snap = JobSnapshot::from_ids([" 1.arthur ", "2.arthur", "", "1.arthur"]);
        assert_eq!(snap.len(), 2);
        assert!(snap.contains("1.arthur"));
        assert_eq!(snap.iter().collect::<Vec<_>>(), vec!["1.arthur", "2.arthur"]);
    }

    #[test]
    fn test_equal_sets_report_nothing() {
        let prev = JobSnapshot::from_ids(["1", "2", "3"]);
        let curr = JobSnapshot::from_ids(["3", "2", "1"]);
        let diff = QueueDiff::between(&prev, curr);
        assert!(diff.finished.is_empty());
        assert!(diff.new.is_empty());
    }

    #[test]
    fn test_empty_previous_reports_nothing_finished() {
        let curr = JobSnapshot::from_ids(["7", "8"]);
        let diff = QueueDiff::between(&JobSnapshot::default(), curr);
        assert!(diff.finished.is_empty());
        assert_eq!(diff.new, vec!["7", "8"]);
    }

    #[test]
    fn test_finished_is_previous_minus_current() {
        let prev = JobSnapshot::from_ids(["10.arthur", "11.arthur", "12.arthur"]);
        let curr = JobSnapshot::from_ids(["12.arthur", "13.arthur"]);
        let diff = QueueDiff::between(&prev, curr);
        assert_eq!(diff.finished, vec!["10.arthur", "11.arthur"]);
        assert_eq!(diff.new, vec!["13.arthur"]);
        assert_eq!(diff.current.len(), 2);
    }
}
