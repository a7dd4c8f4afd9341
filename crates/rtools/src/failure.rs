//! External tool failures that set the process exit status.

use miette::{Diagnostic, IntoDiagnostic};
use thiserror::Error;

/// An external command ran and exited non-zero; its status becomes ours.
#[derive(Error, Diagnostic, Debug)]
#[error("{command} exited with status {status}")]
pub struct ToolFailure {
    pub command: &'static str,
    pub status: i32,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
}

/// Convert a library error into a report, keeping the exit status of the
/// external `command` when `status` finds one.
pub fn with_status<T, E>(
    result: Result<T, E>,
    command: &'static str,
    status: impl FnOnce(&E) -> Option<i32>,
) -> miette::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    match result {
        Ok(value) => Ok(value),
        Err(err) => match status(&err) {
            Some(status) => Err(ToolFailure {
                command,
                status,
                source: Box::new(err),
            }
            .into()),
            None => Err(err).into_diagnostic(),
        },
    }
}

/// Process exit status for a failed run.
pub fn exit_status(report: &miette::Report) -> i32 {
    report
        .downcast_ref::<ToolFailure>()
        .map(|failure| failure.status)
        .unwrap_or(1)
}
