//! Submit agent for the SLURM linux cluster.

use crate::SubmitOutcome;
use crate::error::SubmitError;
use crate::params::{
    Dependency, ExportVariables, HostContext, WalltimeSetting, check_email_address,
    check_required, default_job_name, render_lines,
};
use crate::template;
use once_cell::sync::Lazy;
use regex::Regex;
use rtools_parsers::Walltime;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

pub const AGENT: &str = "linuxcluster";

/// SLURM limits job names to this many characters here.
pub const MAX_NAME_LEN: usize = 10;

/// A cluster jobs can be sent to; nodes are always allocated completely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cluster {
    pub name: &'static str,
    pub cpu_per_node: u32,
    /// Login nodes that can submit to this cluster
    pub login_pattern: &'static str,
}

pub const CLUSTERS: [Cluster; 3] = [
    Cluster {
        name: "mpp1",
        cpu_per_node: 16,
        login_pattern: r"^lxlogin(1|2)",
    },
    Cluster {
        name: "mpp2",
        cpu_per_node: 28,
        login_pattern: r"^lxlogin(5|6)",
    },
    Cluster {
        name: "serial",
        cpu_per_node: 1,
        login_pattern: r"^lxlogin(5|6|7)",
    },
];

/// Compiled login patterns, keyed by cluster name.
static LOGIN_RES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    CLUSTERS
        .iter()
        .map(|c| (c.name, Regex::new(c.login_pattern).expect("valid regex")))
        .collect()
});

impl Cluster {
    pub fn lookup(name: &str) -> Result<Cluster, SubmitError> {
        let name = name.trim().to_lowercase();
        CLUSTERS
            .iter()
            .find(|c| c.name == name)
            .copied()
            .ok_or(SubmitError::UnknownCluster(name))
    }

    /// Whether `host` is a login node that can submit here.
    pub fn accepts_host(&self, host: &str) -> bool {
        LOGIN_RES
            .iter()
            .find(|(name, _)| *name == self.name)
            .is_some_and(|(_, re)| re.is_match(host))
    }
}

/// Everything the linuxcluster agent can be configured with.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinuxClusterParams {
    pub program: Option<String>,
    pub job_dir: Option<String>,
    pub name: Option<String>,
    pub walltime: Option<WalltimeSetting>,
    pub nnodes: Option<u32>,
    pub clusters: Option<String>,
    pub email_address: Option<String>,
    pub clean: Option<Vec<String>>,
    pub debug: Option<bool>,
    pub outfile: Option<String>,
    pub load_modules: Option<Vec<String>>,
    pub unload_modules: Option<Vec<String>>,
    pub exclude_nodes: Option<Vec<String>>,
    pub export_variables: Option<Vec<String>>,
    pub setup: Option<Vec<String>>,
    pub precmd: Option<Vec<String>>,
    pub cmd: Option<Vec<String>>,
    pub postcmd: Option<Vec<String>>,
}

crate::impl_overlay!(LinuxClusterParams {
    program,
    job_dir,
    name,
    walltime,
    nnodes,
    clusters,
    email_address,
    clean,
    debug,
    outfile,
    load_modules,
    unload_modules,
    exclude_nodes,
    export_variables,
    setup,
    precmd,
    cmd,
    postcmd,
});

/// A fully resolved linuxcluster job.
#[derive(Debug, Clone)]
pub struct LinuxClusterJob {
    pub name: String,
    pub job_dir: PathBuf,
    pub program: String,
    pub walltime: Walltime,
    pub nnodes: u32,
    pub cluster: Cluster,
    ntasks: u32,
    pub email_address: String,
    pub clean: Vec<String>,
    pub debug: bool,
    pub outfile: String,
    pub load_modules: Vec<String>,
    pub unload_modules: Vec<String>,
    pub exclude_nodes: Vec<String>,
    pub export_variables: ExportVariables,
    pub setup: Vec<String>,
    pub precmd: Vec<String>,
    pub cmd: Vec<String>,
    pub postcmd: Vec<String>,
}

#[derive(Serialize)]
struct LinuxClusterContext {
    outfile: String,
    job_dir: String,
    name: String,
    clusters: String,
    ntasks: u32,
    exclude_nodes: String,
    email_address: String,
    walltime: String,
    modules: String,
    debug: String,
    setup: String,
    environment: String,
    program: String,
    precmd: String,
    cmd: String,
    postcmd: String,
    clean: String,
}

/// Cut `name` to the SLURM limit.
pub fn truncate_name(name: String) -> String {
    if name.chars().count() <= MAX_NAME_LEN {
        return name;
    }
    let short: String = name.chars().take(MAX_NAME_LEN).collect();
    tracing::warn!(
        "job name '{}' exceeds {} characters, shortened to '{}'",
        name,
        MAX_NAME_LEN,
        short
    );
    short
}

fn modules_block(unload: &[String], load: &[String]) -> String {
    if unload.is_empty() && load.is_empty() {
        return "# no user defined modules".to_string();
    }
    let mut block = String::from("# initialize the module system\nsource /etc/profile.d/modules.sh\n");
    block.push_str("\n# unloading modules");
    for module in unload {
        block.push_str(&format!("\nmodule unload {}", module));
    }
    block.push_str("\n# loading user modules");
    for module in load {
        block.push_str(&format!("\nmodule load {}", module));
    }
    block.push_str("\n# list all modules\nmodule list");
    block
}

fn clean_block(clean: &[String]) -> Result<String, SubmitError> {
    match clean {
        [] => Ok("# nothing to clean".to_string()),
        [only] if only.trim() == "*" => Err(SubmitError::CleanEverything),
        files => Ok(format!("rm -rf {}", files.join(" "))),
    }
}

fn exclude_nodes_line(nodes: &[String]) -> String {
    if nodes.is_empty() {
        "# no nodes excluded".to_string()
    } else {
        format!("#SBATCH --exclude={}", nodes.join(","))
    }
}

impl LinuxClusterJob {
    /// Apply built-in defaults and validate.
    pub fn from_params(params: LinuxClusterParams, host: &HostContext) -> Result<Self, SubmitError> {
        check_required(&[
            ("walltime", params.walltime.is_some()),
            ("program", params.program.is_some()),
            ("nnodes", params.nnodes.is_some()),
            ("clusters", params.clusters.is_some()),
            ("email_address", params.email_address.is_some()),
        ])?;

        let job_dir = host.job_dir(params.job_dir.as_deref());
        let name = truncate_name(params.name.unwrap_or_else(|| default_job_name(&job_dir)));

        let cluster = Cluster::lookup(params.clusters.as_deref().unwrap_or_default())?;
        if !cluster.accepts_host(&host.host) {
            tracing::warn!(
                "submitting to {} from {}, which does not match its login nodes ({})",
                cluster.name,
                host.host,
                cluster.login_pattern
            );
        }

        let nnodes = params.nnodes.unwrap_or_default();
        let ntasks = nnodes
            .checked_mul(cluster.cpu_per_node)
            .ok_or(SubmitError::TooManyNodes {
                nnodes,
                cluster: cluster.name,
            })?;

        let email_address = params.email_address.unwrap_or_default();
        check_email_address(&email_address)?;

        let walltime = params
            .walltime
            .ok_or_else(|| SubmitError::MissingParameters(vec!["walltime".to_string()]))?
            .resolve()?;

        let clean = params.clean.unwrap_or_default();
        clean_block(&clean)?;

        let outfile = match params.outfile {
            Some(outfile) => host.resolve(&outfile),
            None => job_dir
                .join(format!("{}.%j.%N.out", name))
                .display()
                .to_string(),
        };

        Ok(Self {
            program: host.resolve(params.program.as_deref().unwrap_or_default()),
            walltime,
            nnodes,
            cluster,
            ntasks,
            email_address,
            clean,
            debug: params.debug.unwrap_or(true),
            outfile,
            load_modules: params.load_modules.unwrap_or_default(),
            unload_modules: params.unload_modules.unwrap_or_default(),
            exclude_nodes: params.exclude_nodes.unwrap_or_default(),
            export_variables: ExportVariables::parse(
                &params.export_variables.unwrap_or_default(),
                host,
            )?,
            setup: params.setup.unwrap_or_default(),
            precmd: params.precmd.unwrap_or_default(),
            cmd: params.cmd.unwrap_or_else(|| vec!["$program".to_string()]),
            postcmd: params.postcmd.unwrap_or_default(),
            name,
            job_dir,
        })
    }

    /// `--ntasks`: every allocated core of every node.
    pub fn ntasks(&self) -> u32 {
        self.ntasks
    }

    pub fn job_file_name(&self) -> String {
        format!("job.{}.{}", self.name, AGENT)
    }

    pub fn job_file(&self) -> PathBuf {
        self.job_dir.join(self.job_file_name())
    }

    /// Render the SLURM job script.
    pub fn render(&self) -> Result<String, SubmitError> {
        let context = LinuxClusterContext {
            outfile: self.outfile.clone(),
            job_dir: self.job_dir.display().to_string(),
            name: self.name.clone(),
            clusters: self.cluster.name.to_string(),
            ntasks: self.ntasks(),
            exclude_nodes: exclude_nodes_line(&self.exclude_nodes),
            email_address: self.email_address.clone(),
            walltime: self.walltime.to_string(),
            modules: modules_block(&self.unload_modules, &self.load_modules),
            debug: if self.debug { "" } else { "# " }.to_string(),
            setup: render_lines(&self.setup),
            environment: self.export_variables.render(),
            program: self.program.clone(),
            precmd: render_lines(&self.precmd),
            cmd: render_lines(&self.cmd),
            postcmd: render_lines(&self.postcmd),
            clean: clean_block(&self.clean)?,
        };
        Ok(template::render(AGENT, template::LINUXCLUSTER, &context)?)
    }

    pub fn write(&self) -> Result<PathBuf, SubmitError> {
        let script = self.render()?;
        let path = self.job_file();
        fs::write(&path, script).map_err(|e| SubmitError::io(&path, e))?;
        tracing::debug!("wrote job script {}", path.display());
        Ok(path)
    }

    /// Write the job script and, unless `dryrun`, submit it with sbatch.
    pub async fn submit(
        &self,
        dependency: Option<&Dependency>,
        dryrun: bool,
    ) -> Result<SubmitOutcome, SubmitError> {
        let job_file = self.write()?;

        if dryrun {
            tracing::info!("prepared but not submitted (SLURM title \"{}\")", self.name);
            return Ok(SubmitOutcome::dry_run(job_file));
        }

        let dependency = dependency.and_then(Dependency::render);
        let submission = rtools_slurm::submit_sbatch(
            &self.job_dir,
            &self.job_file_name(),
            dependency.as_deref(),
        )
        .await?;
        tracing::info!(
            cluster = submission.cluster.as_deref().unwrap_or(self.cluster.name),
            "submitted with SLURM title \"{}\" (job id: {})",
            self.name,
            submission.job_id
        );

        Ok(SubmitOutcome::submitted(
            job_file,
            submission.job_id,
            submission.cluster,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn params() -> LinuxClusterParams {
        LinuxClusterParams {
            program: Some("$WORK/bin/aims.x".to_string()),
            walltime: Some(WalltimeSetting::from("02:00:00")),
            nnodes: Some(2),
            clusters: Some("mpp2".to_string()),
            email_address: Some("alice@tum.de".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_all_missing_required_reported() {
        let temp = TempDir::new().unwrap();
        let host = HostContext::for_tests(temp.path());
        let err = LinuxClusterJob::from_params(LinuxClusterParams::default(), &host).unwrap_err();
        let msg = err.to_string();
        for name in ["walltime", "program", "nnodes", "clusters", "email_address"] {
            assert!(msg.contains(&format!("\"{}\"", name)), "{} missing in {}", name, msg);
        }
    }

    #[test]
    fn test_cluster_lookup() {
        assert_eq!(Cluster::lookup("MPP1").unwrap().cpu_per_node, 16);
        assert_eq!(Cluster::lookup("serial").unwrap().cpu_per_node, 1);
        assert!(matches!(
            Cluster::lookup("cm2"),
            Err(SubmitError::UnknownCluster(_))
        ));
        assert!(Cluster::lookup("mpp2").unwrap().accepts_host("lxlogin6.lrz.de"));
        assert!(!Cluster::lookup("mpp2").unwrap().accepts_host("lxlogin1.lrz.de"));
        assert!(Cluster::lookup("mpp1").unwrap().accepts_host("lxlogin2"));
        assert!(Cluster::lookup("serial").unwrap().accepts_host("lxlogin7"));
        assert_eq!(LOGIN_RES.len(), CLUSTERS.len());
    }

    #[test]
    fn test_ntasks_overflow_rejected() {
        let temp = TempDir::new().unwrap();
        let host = HostContext::for_tests(temp.path());
        let mut p = params();
        p.nnodes = Some(u32::MAX);
        assert!(matches!(
            LinuxClusterJob::from_params(p, &host),
            Err(SubmitError::TooManyNodes { nnodes: u32::MAX, cluster: "mpp2" })
        ));
    }

    #[test]
    fn test_truncate_name() {
        assert_eq!(truncate_name("short".to_string()), "short");
        assert_eq!(truncate_name("averylongjobname".to_string()), "averylongj");
    }

    #[test]
    fn test_clean_block() {
        assert_eq!(clean_block(&[]).unwrap(), "# nothing to clean");
        assert_eq!(
            clean_block(&["*.tmp".to_string(), "scratch".to_string()]).unwrap(),
            "rm -rf *.tmp scratch"
        );
        assert!(matches!(
            clean_block(&["*".to_string()]),
            Err(SubmitError::CleanEverything)
        ));
    }

    #[test]
    fn test_clean_everything_rejected_early() {
        let temp = TempDir::new().unwrap();
        let host = HostContext::for_tests(temp.path());
        let mut p = params();
        p.clean = Some(vec!["*".to_string()]);
        assert!(matches!(
            LinuxClusterJob::from_params(p, &host),
            Err(SubmitError::CleanEverything)
        ));
    }

    #[test]
    fn test_modules_block() {
        assert_eq!(modules_block(&[], &[]), "# no user defined modules");
        let block = modules_block(&["mpi.intel".to_string()], &["mpi.ompi".to_string()]);
        assert!(block.contains("\nmodule unload mpi.intel\n"));
        assert!(block.contains("\nmodule load mpi.ompi\n"));
        assert!(block.ends_with("module list"));
    }

    #[tokio::test]
    async fn test_dry_run_writes_script() {
        let temp = TempDir::new().unwrap();
        let host = HostContext::for_tests(temp.path());

        let mut p = params();
        p.name = Some("surface_relaxation".to_string());
        p.exclude_nodes = Some(vec!["mpp2r01c01s01".to_string(), "mpp2r01c01s02".to_string()]);
        p.load_modules = Some(vec!["mkl".to_string()]);
        let job = LinuxClusterJob::from_params(p, &host).unwrap();
        assert_eq!(job.name, "surface_re");
        assert_eq!(job.program, "/work/alice/bin/aims.x");
        assert_eq!(job.ntasks(), 56);

        let outcome = job.submit(None, true).await.unwrap();
        assert!(outcome.job_id.is_none());
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.job_file, temp.path().join("job.surface_re.linuxcluster"));

        let script = fs::read_to_string(&outcome.job_file).unwrap();
        let outfile = temp.path().join("surface_re.%j.%N.out");
        assert!(script.starts_with("#!/bin/bash\n"));
        assert!(script.contains(&format!("#SBATCH -o {}\n", outfile.display())));
        assert!(script.contains("#SBATCH -J surface_re\n"));
        assert!(script.contains("#SBATCH --clusters=mpp2\n"));
        assert!(script.contains("#SBATCH --ntasks 56\n"));
        assert!(script.contains("#SBATCH --exclude=mpp2r01c01s01,mpp2r01c01s02\n"));
        assert!(script.contains("#SBATCH --mail-user=alice@tum.de\n"));
        assert!(script.contains("#SBATCH --time=02:00:00\n"));
        assert!(script.contains("module load mkl"));
        assert!(script.contains("program=/work/alice/bin/aims.x\n"));
        assert!(script.contains("# nothing to clean"));
    }
}
