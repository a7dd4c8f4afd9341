//! Configuration file management.
//!
//! ```toml
//! scheduler = "pbs"            # pbs or slurm; detected when absent
//!
//! [myq]
//! state_file = "~/.rtools/myq/me.jobs"
//!
//! [mensa]
//! default = "garching"         # name or numeric id
//! url = "https://.../speiseplan_{id}_-de.html"
//! ```

use rtools_queue::Scheduler;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings loaded from `~/.rtools/config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RtoolsConfig {
    /// Scheduler to talk to
    pub scheduler: Option<Scheduler>,
    pub myq: MyqConfig,
    pub mensa: MensaConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MyqConfig {
    /// Snapshot file; `~` is expanded
    pub state_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MensaConfig {
    /// Location name or numeric id
    pub default: Option<String>,
    /// Page URL with an `{id}` placeholder
    pub url: Option<String>,
}

pub fn expand_config_path(path: &Path) -> PathBuf {
    let path_str = path.to_str().unwrap_or_default();
    if let Some(rest) = path_str.strip_prefix("~/") {
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(rest);
        }
    }
    path.to_path_buf()
}

pub fn default_config_path() -> PathBuf {
    expand_config_path(Path::new("~/.rtools/config.toml"))
}

impl RtoolsConfig {
    /// Load configuration from `path`, or from the default location.
    ///
    /// Returns the default configuration if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => expand_config_path(path),
            None => default_config_path(),
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Snapshot file from the config, with `~` expanded.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.myq
            .state_file
            .as_deref()
            .map(|path| expand_config_path(Path::new(path)))
    }
}
