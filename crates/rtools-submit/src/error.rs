//! Error type shared by the submit agents.

use crate::defaults::DefaultsError;
use rtools_parsers::WalltimeError;
use rtools_pbs::QsubError;
use rtools_slurm::SbatchError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("Error while checking for mandatory arguments{}", format_missing(.0))]
    MissingParameters(Vec<String>),

    #[error("Invalid user mail address '{0}' does not match r\"[\\w_\\-\\.]+@[\\w_\\-]+\\.[\\w]\"")]
    InvalidEmail(String),

    #[error(transparent)]
    Walltime(#[from] WalltimeError),

    #[error("Invalid memory request '{0}': use a number (gb) or a value with kb, mb or gb")]
    InvalidMemory(String),

    #[error("Support for \"{0}\" clusters not implemented (expected mpp1, mpp2 or serial)")]
    UnknownCluster(String),

    #[error("{nnodes} nodes on {cluster} exceed the number of tasks SLURM can address")]
    TooManyNodes { nnodes: u32, cluster: &'static str },

    #[error("Refusing to clean the entire job directory ('*')")]
    CleanEverything,

    #[error("No write access to export_dir: {}", .0.display())]
    ExportDirNotWritable(PathBuf),

    #[error("Invalid export variable '{0}': expected KEY=VALUE")]
    InvalidExport(String),

    #[error("Unknown dependency type '{0}' (expected afterok, afterany, afternotok or after)")]
    InvalidDependencyType(String),

    #[error("Cannot determine {0} of the submitting host")]
    Environment(&'static str),

    #[error(transparent)]
    Defaults(#[from] DefaultsError),

    #[error("Failed to render job script: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Qsub(#[from] QsubError),

    #[error(transparent)]
    Sbatch(#[from] SbatchError),
}

fn format_missing(names: &[String]) -> String {
    names
        .iter()
        .map(|name| format!("\n\t* required parameter \"{}\" not present", name))
        .collect()
}

impl SubmitError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SubmitError::Io {
            path: path.into(),
            source,
        }
    }

    /// Exit status of the submission command, when it ran and failed.
    pub fn status(&self) -> Option<i32> {
        match self {
            SubmitError::Qsub(QsubError::Command(e)) => e.status(),
            SubmitError::Sbatch(SbatchError::Command(e)) => e.status(),
            _ => None,
        }
    }
}
