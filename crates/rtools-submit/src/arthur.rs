//! Submit agent for the PBS "arthur" cluster.

use crate::SubmitOutcome;
use crate::error::SubmitError;
use crate::params::{
    Dependency, ExportVariables, HostContext, WalltimeSetting, check_email_address,
    check_required, default_job_name, render_lines,
};
use crate::template;
use once_cell::sync::Lazy;
use regex::Regex;
use rtools_parsers::{Walltime, pbs_memory_request};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const AGENT: &str = "arthur";

/// Node features the arthur scheduler knows about.
pub const AVAILABLE_FEATURES: [&str; 14] = [
    "Intel",
    "AMD",
    "jessie",
    "Opteron6272",
    "Opteron2435",
    "Opteron6172",
    "XeonE5640",
    "XeonE5540",
    "em64t",
    "amd64",
    "x86_64",
    "opteron",
    "xeon",
    "smp",
];

/// Files never staged to the tick node: PBS output, agent bookkeeping and
/// earlier job scripts.
static COPY_EXCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r".*\.[oe][0-9]{7}|arthur\.(jobid|ticks)|job\..+\.arthur").expect("valid regex")
});

/// Memory per core as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum MemorySetting {
    Gigabytes(u64),
    Text(String),
}

impl MemorySetting {
    pub fn from_arg(s: &str) -> Self {
        match s.trim().parse::<u64>() {
            Ok(gb) => MemorySetting::Gigabytes(gb),
            Err(_) => MemorySetting::Text(s.trim().to_string()),
        }
    }

    /// PBS `pmem` value: numbers are GB, strings must carry a unit.
    pub fn resolve(&self) -> Result<String, SubmitError> {
        match self {
            MemorySetting::Gigabytes(gb) => Ok(format!("{}gb", gb)),
            MemorySetting::Text(text) if text.chars().all(|c| c.is_ascii_digit()) => {
                Err(SubmitError::InvalidMemory(text.clone()))
            }
            MemorySetting::Text(text) => {
                pbs_memory_request(text).ok_or_else(|| SubmitError::InvalidMemory(text.clone()))
            }
        }
    }
}

/// Everything the arthur agent can be configured with, from defaults files
/// or the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArthurParams {
    pub program: Option<String>,
    pub job_dir: Option<String>,
    pub name: Option<String>,
    pub walltime: Option<WalltimeSetting>,
    pub ncpu: Option<u32>,
    pub memory: Option<MemorySetting>,
    pub copy: Option<Vec<String>>,
    pub copyback: Option<Vec<String>>,
    pub copyback_export: Option<Vec<String>>,
    pub export_dir: Option<String>,
    pub node_features: Option<Vec<String>>,
    pub exclude_nodes: Option<Vec<String>>,
    pub email: Option<bool>,
    pub email_address: Option<String>,
    pub debug: Option<bool>,
    pub result_dir: Option<String>,
    pub infofile: Option<String>,
    pub cleanup: Option<bool>,
    pub export_variables: Option<Vec<String>>,
    pub setup: Option<Vec<String>>,
    pub precmd: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub postcmd: Option<Vec<String>>,
}

crate::impl_overlay!(ArthurParams {
    program,
    job_dir,
    name,
    walltime,
    ncpu,
    memory,
    copy,
    copyback,
    copyback_export,
    export_dir,
    node_features,
    exclude_nodes,
    email,
    email_address,
    debug,
    result_dir,
    infofile,
    cleanup,
    export_variables,
    setup,
    precmd,
    cmd,
    postcmd,
});

/// Fail unless files can be created in `dir`; the job copies results there
/// only after it has run.
fn check_writable(dir: &Path) -> Result<(), SubmitError> {
    let marker = dir.join(".rtools-write-check");
    let written = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&marker)
        .and_then(|_| fs::remove_file(&marker));
    match written {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(SubmitError::ExportDirNotWritable(dir.to_path_buf()))
        }
        Err(e) => Err(SubmitError::io(dir, e)),
    }
}

/// A fully resolved arthur job.
#[derive(Debug, Clone)]
pub struct ArthurJob {
    pub name: String,
    pub job_dir: PathBuf,
    pub program: String,
    pub walltime: Walltime,
    pub ncpu: u32,
    pub memory: String,
    pub copy: Vec<String>,
    pub copyback: Vec<String>,
    pub copyback_export: Vec<String>,
    pub export_dir: PathBuf,
    pub node_features: Vec<String>,
    pub exclude_nodes: Vec<String>,
    pub email: bool,
    pub email_address: String,
    pub debug: bool,
    pub result_dir: String,
    pub infofile: String,
    pub cleanup: bool,
    pub export_variables: ExportVariables,
    pub setup: Vec<String>,
    pub precmd: Vec<String>,
    pub cmd: Vec<String>,
    pub postcmd: Vec<String>,
}

#[derive(Serialize)]
struct ArthurContext {
    name: String,
    email: String,
    email_address: String,
    walltime: String,
    ncpu: u32,
    node_features: String,
    memory: String,
    exclude_nodes: String,
    job_dir: String,
    result_dir: String,
    export_dir: String,
    copy: String,
    copyback: String,
    copyback_export: String,
    setup: String,
    environment: String,
    program: String,
    infofile: String,
    debug: String,
    precmd: String,
    cmd: String,
    postcmd: String,
    export_copy: String,
    cleanup: String,
}

/// Keep the known node features, warn about and drop the rest.
pub fn filter_node_features(features: &[String]) -> Vec<String> {
    features
        .iter()
        .filter(|feature| {
            let known = AVAILABLE_FEATURES.contains(&feature.as_str());
            if !known {
                tracing::warn!("unknown node feature '{}' (will be disregarded)", feature);
            }
            known
        })
        .cloned()
        .collect()
}

/// Export directory mirroring `job_dir` on the submitting host's export disk.
pub fn derive_export_dir(job_dir: &Path, user: &str, host: &str) -> PathBuf {
    let job_dir = job_dir.to_string_lossy();
    PathBuf::from(job_dir.replace(
        &format!("/data/{}/", user),
        &format!("/net/{}/export/{}/", host, user),
    ))
}

fn exclude_nodes_block(nodes: &[String]) -> String {
    if nodes.is_empty() {
        return "# no nodes excluded".to_string();
    }
    let hosts: Vec<String> = nodes.iter().map(|n| format!("!{}", n)).collect();
    format!("# exclude nodes\n#$ -l h={}", hosts.join("&"))
}

impl ArthurJob {
    /// Apply built-in defaults and validate.
    pub fn from_params(params: ArthurParams, host: &HostContext) -> Result<Self, SubmitError> {
        check_required(&[("program", params.program.is_some())])?;

        let job_dir = host.job_dir(params.job_dir.as_deref());
        let name = params.name.unwrap_or_else(|| default_job_name(&job_dir));

        // an explicit address switches notifications on
        let (email, email_address) = match params.email_address {
            Some(address) => {
                check_email_address(&address)?;
                (true, address)
            }
            None => (params.email.unwrap_or(true), host.user.clone()),
        };

        let walltime = match params.walltime {
            Some(setting) => setting.resolve()?,
            None => Walltime::from_hours(1)?,
        };
        let memory = match params.memory {
            Some(setting) => setting.resolve()?,
            None => "1000mb".to_string(),
        };

        let export_dir = match params.export_dir.filter(|dir| !dir.is_empty()) {
            Some(dir) => {
                let dir = PathBuf::from(host.resolve(&dir));
                if dir.is_absolute() {
                    dir
                } else {
                    host.cwd.join(dir)
                }
            }
            None => derive_export_dir(&job_dir, &host.user, &host.host),
        };

        let export_variables =
            ExportVariables::parse(&params.export_variables.unwrap_or_default(), host)?;

        Ok(Self {
            name,
            program: host.resolve(params.program.as_deref().unwrap_or_default()),
            walltime,
            ncpu: params.ncpu.unwrap_or(1),
            memory,
            copy: params.copy.unwrap_or_else(|| vec!["*".to_string()]),
            copyback: params.copyback.unwrap_or_else(|| vec!["*".to_string()]),
            copyback_export: params.copyback_export.unwrap_or_default(),
            export_dir,
            node_features: filter_node_features(&params.node_features.unwrap_or_default()),
            exclude_nodes: params.exclude_nodes.unwrap_or_default(),
            email,
            email_address,
            debug: params.debug.unwrap_or(true),
            result_dir: params.result_dir.unwrap_or_else(|| ".".to_string()),
            infofile: params.infofile.unwrap_or_else(|| "arthur.info".to_string()),
            cleanup: params.cleanup.unwrap_or(false),
            export_variables,
            setup: params.setup.unwrap_or_default(),
            precmd: params.precmd.unwrap_or_default(),
            cmd: params.cmd.unwrap_or_else(|| vec!["$program".to_string()]),
            postcmd: params.postcmd.unwrap_or_default(),
            job_dir,
        })
    }

    pub fn job_file_name(&self) -> String {
        format!("job.{}.{}", self.name, AGENT)
    }

    pub fn job_file(&self) -> PathBuf {
        self.job_dir.join(self.job_file_name())
    }

    /// Files staged to the tick node. A lone `*` expands to the job
    /// directory's entries minus the result dir and bookkeeping files.
    pub fn copy_list(&self) -> Result<Vec<String>, SubmitError> {
        if self.copy != ["*"] {
            return Ok(self.copy.clone());
        }

        let entries = fs::read_dir(&self.job_dir).map_err(|e| SubmitError::io(&self.job_dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| SubmitError::io(&self.job_dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || name == self.result_dir || COPY_EXCLUDE_RE.is_match(&name)
            {
                continue;
            }
            files.push(name);
        }
        files.sort();
        Ok(files)
    }

    /// Render the PBS job script.
    pub fn render(&self) -> Result<String, SubmitError> {
        let context = ArthurContext {
            name: self.name.clone(),
            email: if self.email { "#PBS -m ae" } else { "##PBS -m ae" }.to_string(),
            email_address: self.email_address.clone(),
            walltime: self.walltime.to_string(),
            ncpu: self.ncpu,
            node_features: self
                .node_features
                .iter()
                .map(|f| format!(":{}", f))
                .collect(),
            memory: self.memory.clone(),
            exclude_nodes: exclude_nodes_block(&self.exclude_nodes),
            job_dir: self.job_dir.display().to_string(),
            result_dir: self.result_dir.clone(),
            export_dir: self.export_dir.display().to_string(),
            copy: self.copy_list()?.join(" "),
            copyback: self.copyback.join(" "),
            copyback_export: self.copyback_export.join(" "),
            setup: render_lines(&self.setup),
            environment: self.export_variables.render(),
            program: self.program.clone(),
            infofile: self.infofile.clone(),
            debug: if self.debug { "" } else { "# " }.to_string(),
            precmd: render_lines(&self.precmd),
            cmd: render_lines(&self.cmd),
            postcmd: render_lines(&self.postcmd),
            export_copy: if self.copyback_export.is_empty() {
                "# --> nothing will be copied to export".to_string()
            } else {
                "cp -a $exportoutput $exportfolder".to_string()
            },
            cleanup: if self.cleanup { "" } else { "# " }.to_string(),
        };
        Ok(template::render(AGENT, template::ARTHUR, &context)?)
    }

    /// Create the result and export directories and write the job script.
    pub fn write(&self) -> Result<PathBuf, SubmitError> {
        let result_dir = self.job_dir.join(&self.result_dir);
        fs::create_dir_all(&result_dir).map_err(|e| SubmitError::io(&result_dir, e))?;
        if !self.copyback_export.is_empty() {
            if self.export_dir.is_dir() {
                check_writable(&self.export_dir)?;
            } else {
                fs::create_dir_all(&self.export_dir)
                    .map_err(|e| SubmitError::io(&self.export_dir, e))?;
            }
        }

        let script = self.render()?;
        let path = self.job_file();
        fs::write(&path, script).map_err(|e| SubmitError::io(&path, e))?;
        tracing::debug!("wrote job script {}", path.display());
        Ok(path)
    }

    /// Write the job script and, unless `dryrun`, submit it with qsub.
    pub async fn submit(
        &self,
        dependency: Option<&Dependency>,
        dryrun: bool,
    ) -> Result<SubmitOutcome, SubmitError> {
        let job_file = self.write()?;

        if dryrun {
            tracing::info!("prepared but not submitted (PBS title \"{}\")", self.name);
            return Ok(SubmitOutcome::dry_run(job_file));
        }

        let dependency = dependency.and_then(Dependency::render);
        let job_id = rtools_pbs::submit_qsub(
            &self.job_dir,
            &self.job_file_name(),
            dependency.as_deref(),
        )
        .await?;
        tracing::info!("submitted with PBS title \"{}\" (job id: {})", self.name, job_id);

        self.write_info_file(&job_id)?;
        Ok(SubmitOutcome::submitted(job_file, job_id, None))
    }

    /// Record the submission in `<infofile>.<numeric id>`, the same file the
    /// job script appends to once it starts.
    fn write_info_file(&self, job_id: &str) -> Result<(), SubmitError> {
        let numeric = job_id.split('.').next().unwrap_or(job_id);
        let path = self.job_dir.join(format!("{}.{}", self.infofile, numeric));
        let content = format!(
            "job submitted at {}\n\npbs job id   : {}\npbs job name : {}\n",
            chrono::Local::now().format("%c"),
            job_id,
            self.name
        );
        fs::write(&path, content).map_err(|e| SubmitError::io(&path, e))
    }
}
