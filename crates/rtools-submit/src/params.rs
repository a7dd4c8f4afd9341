//! Parameter handling shared by all submit agents.

use crate::error::SubmitError;
use once_cell::sync::Lazy;
use regex::Regex;
use rtools_parsers::Walltime;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

static HOME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~|\$HOME|\$\{HOME\}").expect("valid regex"));

static WORK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$WORK|\$\{WORK\}").expect("valid regex"));

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\w_\-\.]+@[\w_\-]+\.[\w]").expect("valid regex"));

/// Facts about the submitting user and host.
#[derive(Debug, Clone)]
pub struct HostContext {
    pub user: String,
    pub host: String,
    pub home: PathBuf,
    /// `$WORK`, if set
    pub work: Option<String>,
    pub cwd: PathBuf,
}

impl HostContext {
    /// Collect user, host name, home, `$WORK` and the working directory.
    pub fn detect() -> Result<Self, SubmitError> {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .map_err(|_| SubmitError::Environment("the user name"))?;
        let host = hostname::get()
            .map_err(|_| SubmitError::Environment("the host name"))?
            .to_string_lossy()
            .into_owned();
        let home = dirs::home_dir().ok_or(SubmitError::Environment("the home directory"))?;
        let cwd = std::env::current_dir().map_err(|e| SubmitError::io(".", e))?;

        Ok(Self {
            user,
            host,
            home,
            work: std::env::var("WORK").ok(),
            cwd,
        })
    }

    /// Replace `~`, `$HOME` and `$WORK` in `s`.
    pub fn resolve(&self, s: &str) -> String {
        resolve_home_work_vars(s, &self.home.to_string_lossy(), self.work.as_deref())
    }

    /// Resolve the job directory: default cwd, variables expanded, made absolute.
    pub fn job_dir(&self, job_dir: Option<&str>) -> PathBuf {
        let dir = match job_dir {
            Some(dir) => PathBuf::from(self.resolve(dir)),
            None => return self.cwd.clone(),
        };
        if dir.is_absolute() {
            dir
        } else {
            self.cwd.join(dir)
        }
    }
}

#[cfg(test)]
impl HostContext {
    pub(crate) fn for_tests(cwd: &Path) -> Self {
        Self {
            user: "alice".to_string(),
            host: "wks1".to_string(),
            home: PathBuf::from("/home/alice"),
            work: Some("/work/alice".to_string()),
            cwd: cwd.to_path_buf(),
        }
    }
}

/// Replace `~`, `$HOME`, `${HOME}` with `home` and, when known, `$WORK`,
/// `${WORK}` with `work`.
pub fn resolve_home_work_vars(s: &str, home: &str, work: Option<&str>) -> String {
    let resolved = HOME_RE.replace_all(s, regex::NoExpand(home));
    match work {
        Some(work) => WORK_RE
            .replace_all(&resolved, regex::NoExpand(work))
            .into_owned(),
        None => resolved.into_owned(),
    }
}

/// Validate the format of a notification address.
pub fn check_email_address(address: &str) -> Result<(), SubmitError> {
    if EMAIL_RE.is_match(address) {
        Ok(())
    } else {
        Err(SubmitError::InvalidEmail(address.to_string()))
    }
}

/// Fail with every required parameter that has no value.
pub fn check_required(params: &[(&str, bool)]) -> Result<(), SubmitError> {
    let missing: Vec<String> = params
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(SubmitError::MissingParameters(missing))
    }
}

/// Default job name: the last component of the job directory.
pub fn default_job_name(job_dir: &Path) -> String {
    job_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "job".to_string())
}

/// Walltime as written by the user: hours, or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum WalltimeSetting {
    Hours(u64),
    Text(String),
}

impl WalltimeSetting {
    /// Interpret a command line value; plain digits are hours.
    pub fn from_arg(s: &str) -> Self {
        match s.trim().parse::<u64>() {
            Ok(hours) => WalltimeSetting::Hours(hours),
            Err(_) => WalltimeSetting::Text(s.trim().to_string()),
        }
    }

    pub fn resolve(&self) -> Result<Walltime, SubmitError> {
        match self {
            WalltimeSetting::Hours(hours) => Ok(Walltime::from_hours(*hours)?),
            WalltimeSetting::Text(text) => {
                if !text.contains(':') {
                    tracing::warn!(
                        walltime = text.as_str(),
                        "passing walltime hours as string is deprecated"
                    );
                }
                Ok(Walltime::parse(text)?)
            }
        }
    }
}

impl From<&str> for WalltimeSetting {
    fn from(s: &str) -> Self {
        WalltimeSetting::Text(s.to_string())
    }
}

/// Dependency kinds understood by both sbatch and qsub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyType {
    #[default]
    AfterOk,
    AfterAny,
    AfterNotOk,
    After,
}

impl FromStr for DependencyType {
    type Err = SubmitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "afterok" => Ok(DependencyType::AfterOk),
            "afterany" => Ok(DependencyType::AfterAny),
            "afternotok" => Ok(DependencyType::AfterNotOk),
            "after" => Ok(DependencyType::After),
            other => Err(SubmitError::InvalidDependencyType(other.to_string())),
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyType::AfterOk => "afterok",
            DependencyType::AfterAny => "afterany",
            DependencyType::AfterNotOk => "afternotok",
            DependencyType::After => "after",
        };
        write!(f, "{}", s)
    }
}

/// Jobs this submission has to wait for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    pub kind: DependencyType,
    pub job_ids: Vec<String>,
}

impl Dependency {
    pub fn new(kind: DependencyType, job_ids: Vec<String>) -> Self {
        Self { kind, job_ids }
    }

    /// `<type>:<id>:<id>`, or None without job IDs.
    pub fn render(&self) -> Option<String> {
        let ids: Vec<&str> = self
            .job_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .collect();
        if ids.is_empty() {
            return None;
        }
        Some(format!("{}:{}", self.kind, ids.join(":")))
    }
}

/// Environment variables exported in the job script.
///
/// Keys keep their first-seen order; repeated keys join their values with `:`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportVariables {
    vars: Vec<(String, Vec<String>)>,
}

impl ExportVariables {
    /// Parse `KEY=VALUE` pairs, resolving `~`, `$HOME` and `$WORK` in values.
    pub fn parse<S: AsRef<str>>(pairs: &[S], host: &HostContext) -> Result<Self, SubmitError> {
        let mut vars = ExportVariables::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, value) = pair
                .split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .ok_or_else(|| SubmitError::InvalidExport(pair.to_string()))?;
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.add(key.trim(), &host.resolve(value));
        }
        Ok(vars)
    }

    pub fn add(&mut self, key: &str, value: &str) {
        match self.vars.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.vars.push((key.to_string(), vec![value.to_string()])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `export KEY="v1:v2"` lines for the job script.
    pub fn render(&self) -> String {
        if self.vars.is_empty() {
            return "# no user-defined environment variables".to_string();
        }
        self.vars
            .iter()
            .map(|(key, values)| format!("export {}=\"{}\"", key, values.join(":")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// One line per entry, each newline-terminated.
pub(crate) fn render_lines(lines: &[String]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}
