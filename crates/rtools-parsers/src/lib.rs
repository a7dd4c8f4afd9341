//! Shared parsing utilities for scheduler output.
//!
//! Command runner, walltime and memory parsing, and the column helpers used by
//! rtools-slurm, rtools-pbs and the submit agents.

pub mod command;
pub mod memory;
pub mod time;

pub use command::{CommandError, CommandOutput, command_available, run_command, run_command_output};
pub use memory::{MemoryFormat, parse_memory_mb, pbs_memory_request};
pub use time::{Walltime, WalltimeError, parse_duration};

/// Placeholders the scheduler tools print for unset columns.
const PLACEHOLDERS: [&str; 4] = ["-", "--", "N/A", "(null)"];

/// Trimmed column value, or None for blanks and placeholders such as
/// qstat's `--` and sinfo's `(null)`.
pub fn non_empty_string(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() || PLACEHOLDERS.contains(&trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}

/// Split a `|`-separated line as produced by `squeue -o` or `sinfo -o`,
/// requiring at least `min_fields` columns.
pub fn split_delimited(line: &str, min_fields: usize) -> Result<Vec<&str>, String> {
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < min_fields {
        return Err(format!(
            "expected {} fields, got {} in '{}'",
            min_fields,
            fields.len(),
            line
        ));
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_are_empty() {
        assert_eq!(non_empty_string(" 01:00:00 "), Some("01:00:00".to_string()));
        for blank in ["", "  ", "-", "--", "N/A", "(null)"] {
            assert_eq!(non_empty_string(blank), None, "{:?}", blank);
        }
    }

    #[test]
    fn test_split_squeue_line() {
        let line = "4711|relax|RUNNING|mpp2";
        assert_eq!(
            split_delimited(line, 4).unwrap(),
            vec!["4711", "relax", "RUNNING", "mpp2"]
        );
        let err = split_delimited(line, 5).unwrap_err();
        assert!(err.contains("expected 5 fields, got 4"));
    }
}
