//! Per-user and per-directory defaults files for the submit agents.
//!
//! For agent `<a>`, `~/.rtools/defaults/submitagent_<a>.toml` is read first,
//! then `./submitagent_<a>.toml`. Later layers override earlier ones, and
//! values given on the command line override both.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DefaultsError {
    #[error("Failed to read defaults file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid defaults file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Parameter sets that can be layered on top of each other.
pub trait Overlay: Sized {
    /// Values set in `over` replace the ones in `self`.
    fn overlay(self, over: Self) -> Self;
}

/// Implement [`Overlay`] for a struct whose listed fields are all `Option`s.
#[macro_export]
macro_rules! impl_overlay {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::defaults::Overlay for $ty {
            fn overlay(self, over: Self) -> Self {
                Self {
                    $($field: over.$field.or(self.$field),)*
                }
            }
        }
    };
}

/// Locations searched for the defaults of `agent`, lowest priority first.
pub fn defaults_paths(agent: &str, home: Option<&Path>, cwd: &Path) -> Vec<PathBuf> {
    let file_name = format!("submitagent_{}.toml", agent);
    let mut paths = Vec::new();
    if let Some(home) = home {
        paths.push(home.join(".rtools").join("defaults").join(&file_name));
    }
    paths.push(cwd.join(file_name));
    paths
}

/// Parse one defaults file.
pub fn read_defaults_file<T: DeserializeOwned>(path: &Path) -> Result<T, DefaultsError> {
    let content = fs::read_to_string(path).map_err(|source| DefaultsError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| DefaultsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge every existing defaults file of `agent`.
pub fn load_defaults<T>(agent: &str, home: Option<&Path>, cwd: &Path) -> Result<T, DefaultsError>
where
    T: DeserializeOwned + Default + Overlay,
{
    let mut merged = T::default();
    for path in defaults_paths(agent, home, cwd) {
        if !path.is_file() {
            continue;
        }
        tracing::info!("found defaults file {}, importing", path.display());
        merged = merged.overlay(read_defaults_file(&path)?);
    }
    Ok(merged)
}
