//! Command execution utilities for scheduler and build tools.

use thiserror::Error;
use tokio::process::Command;

/// Error type for command execution.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Failed to execute {command}: {error}")]
    Execution { command: String, error: String },
    #[error("Command {command} failed: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl CommandError {
    /// Exit status of the external command, if it ran and exited normally.
    pub fn status(&self) -> Option<i32> {
        match self {
            CommandError::Execution { .. } => None,
            CommandError::Failed { status, .. } => *status,
        }
    }
}

/// Captured result of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code (`None` when terminated by a signal)
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Execute a command and return stdout as a string.
///
/// This is a convenience wrapper that handles common error cases
/// and UTF-8 conversion for scheduler command output.
pub async fn run_command(cmd: &mut Command, name: &str) -> Result<String, CommandError> {
    let output = run_command_output(cmd, name).await?;

    if !output.success() {
        return Err(CommandError::Failed {
            command: name.to_string(),
            status: output.status,
            stderr: output.stderr,
        });
    }

    Ok(output.stdout)
}

/// Execute a command and capture its exit status, stdout and stderr.
///
/// A non-zero exit is not an error here; only failing to spawn is.
pub async fn run_command_output(
    cmd: &mut Command,
    name: &str,
) -> Result<CommandOutput, CommandError> {
    let output = cmd.output().await.map_err(|e| CommandError::Execution {
        command: name.to_string(),
        error: e.to_string(),
    })?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

/// Check whether `program` can be run, probing it with a harmless argument.
pub async fn command_available(program: &str, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_command_success() {
        let mut cmd = Command::new("echo");
        cmd.arg("hello");
        let result = run_command(&mut cmd, "echo").await.unwrap();
        assert_eq!(result.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_command_not_found() {
        let mut cmd = Command::new("nonexistent_command_12345");
        let result = run_command(&mut cmd, "nonexistent").await;
        assert!(matches!(result, Err(CommandError::Execution { .. })));
    }

    #[tokio::test]
    async fn test_run_command_failure_keeps_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo oops >&2; exit 3"]);
        let err = run_command(&mut cmd, "sh").await.unwrap_err();
        assert_eq!(err.status(), Some(3));
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn test_run_command_output_non_zero() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; exit 2"]);
        let output = run_command_output(&mut cmd, "sh").await.unwrap();
        assert!(!output.success());
        assert_eq!(output.status, Some(2));
        assert_eq!(output.stdout.trim(), "out");
    }

    #[tokio::test]
    async fn test_command_available() {
        assert!(command_available("echo", "probe").await);
        assert!(!command_available("nonexistent_command_12345", "--version").await);
    }
}
