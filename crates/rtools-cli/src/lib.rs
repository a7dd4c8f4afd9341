//! CLI argument parsing for rtools.

pub mod config;

pub use config::{ConfigError, RtoolsConfig, default_config_path, expand_config_path};

use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use rtools_build::Compiler;
use rtools_queue::Scheduler;
use rtools_submit::{ArthurParams, LinuxClusterParams, MemorySetting, WalltimeSetting};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rtools")]
#[command(version, about = "Lab tools: queue differ, submit agents, node inventory, mensa menu, build wrapper")]
pub struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file
    #[arg(long, global = true, env = "RTOOLS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report jobs that left the queue since the last call
    Myq(MyqArgs),
    /// Write a job script and submit it
    Submit(SubmitArgs),
    /// Print the compute node inventory
    Nodes(NodesArgs),
    /// Print today's cafeteria menu
    Mensa(MensaArgs),
    /// Build the electronic-structure code with make
    Build(BuildArgs),
}

#[derive(ClapArgs, Debug)]
pub struct MyqArgs {
    /// Show the full record of the INDEX-th queued job (1-based, sorted by id)
    pub index: Option<usize>,

    /// Also print the current queue
    #[arg(short, long)]
    pub list: bool,

    /// Snapshot file (default: ~/.rtools/myq/<user>.jobs)
    #[arg(long)]
    pub state_file: Option<PathBuf>,

    /// Scheduler to query (pbs or slurm)
    #[arg(long)]
    pub scheduler: Option<Scheduler>,

    /// User whose jobs are listed
    #[arg(short, long, env = "USER")]
    pub user: String,
}

#[derive(ClapArgs, Debug)]
pub struct NodesArgs {
    /// Scheduler to query (pbs or slurm)
    #[arg(long)]
    pub scheduler: Option<Scheduler>,
}

#[derive(ClapArgs, Debug)]
pub struct MensaArgs {
    /// Location: arcisstrasse, garching, leopoldstrasse or a numeric id
    #[arg(short, long)]
    pub mensa: Option<String>,

    /// Print every day on the page instead of the first one
    #[arg(short, long)]
    pub all: bool,
}

#[derive(ClapArgs, Debug)]
pub struct BuildArgs {
    /// Compiler suite (intel or gnu)
    #[arg(long, default_value = "intel")]
    pub compiler: Compiler,

    /// Build the MPI version
    #[arg(short = 'p', long)]
    pub mpi: bool,

    /// Build with ScaLAPACK (implies --mpi)
    #[arg(long)]
    pub scalapack: bool,

    /// Parallel make jobs
    #[arg(short, long, default_value = "1")]
    pub jobs: usize,

    /// Source directory holding the Makefile
    #[arg(long, default_value = ".")]
    pub src: PathBuf,

    /// Print the make command instead of running it
    #[arg(long)]
    pub dry_run: bool,

    /// Extra make variables (VAR=value), overriding the profile
    pub overrides: Vec<String>,
}

#[derive(ClapArgs, Debug)]
pub struct SubmitArgs {
    #[command(subcommand)]
    pub agent: SubmitAgent,
}

#[derive(Subcommand, Debug)]
pub enum SubmitAgent {
    /// PBS job on the arthur cluster
    Arthur(ArthurArgs),
    /// SLURM job on the linux cluster
    Linuxcluster(LinuxClusterArgs),
}

/// Options every submit agent understands.
#[derive(ClapArgs, Debug, Default)]
pub struct CommonSubmitArgs {
    /// Program binary (~, $HOME and $WORK are resolved)
    #[arg(short, long)]
    pub program: Option<String>,

    /// Job directory with the prepared input (default: current directory)
    #[arg(short, long)]
    pub job_dir: Option<String>,

    /// Job name (default: name of the job directory)
    #[arg(short = 'N', long)]
    pub name: Option<String>,

    /// Walltime in hours or as hh:mm:ss
    #[arg(short = 't', long)]
    pub walltime: Option<String>,

    /// Write the job script without submitting it
    #[arg(short, long)]
    pub dryrun: bool,

    /// Ignore the submitagent defaults files
    #[arg(long)]
    pub no_defaults: bool,

    /// Environment variable for the job (KEY=VALUE, repeatable)
    #[arg(short = 'e', long = "export")]
    pub export_variables: Vec<String>,

    /// Setup line before the environment (repeatable)
    #[arg(long)]
    pub setup: Vec<String>,

    /// Command run before the main command (repeatable)
    #[arg(long)]
    pub precmd: Vec<String>,

    /// Main command (repeatable, default: $program)
    #[arg(long)]
    pub cmd: Vec<String>,

    /// Command run after the main command (repeatable)
    #[arg(long)]
    pub postcmd: Vec<String>,

    /// Nodes the job must not run on
    #[arg(short = 'x', long, num_args = 1..)]
    pub exclude_nodes: Vec<String>,

    /// Job IDs this job depends on
    #[arg(long = "depend", num_args = 1..)]
    pub depend: Vec<String>,

    /// Dependency type: afterok, afterany, afternotok or after
    #[arg(long, default_value = "afterok")]
    pub depend_type: String,
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

/// `Some(true)` / `Some(false)` for an on/off flag pair, None when neither is given.
fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(ClapArgs, Debug)]
pub struct ArthurArgs {
    #[command(flatten)]
    pub common: CommonSubmitArgs,

    /// Number of cores
    #[arg(short, long)]
    pub ncpu: Option<u32>,

    /// Memory per core: a number (gb) or a value with kb, mb or gb
    #[arg(short, long)]
    pub memory: Option<String>,

    /// Result folder below the job directory
    #[arg(short, long)]
    pub result_dir: Option<String>,

    /// Files copied to the tick node (default: everything)
    #[arg(short, long, num_args = 1..)]
    pub copy: Vec<String>,

    /// Files copied back after the job (default: everything)
    #[arg(short = 'b', long, num_args = 1..)]
    pub copyback: Vec<String>,

    /// Files copied to the export directory
    #[arg(long, num_args = 1..)]
    pub copyback_export: Vec<String>,

    /// Export directory for large output
    #[arg(long)]
    pub export_dir: Option<String>,

    /// Node features, e.g. jessie xeon
    #[arg(short = 'f', long, num_args = 1..)]
    pub node_features: Vec<String>,

    /// Notification address (switches email on)
    #[arg(long)]
    pub email_address: Option<String>,

    /// Send PBS job emails
    #[arg(long, conflicts_with = "no_email")]
    pub email: bool,

    /// Do not send PBS job emails
    #[arg(long)]
    pub no_email: bool,

    /// Remove the temporary directory on the tick node afterwards
    #[arg(long)]
    pub cleanup: bool,

    /// Do not print the environment and trace commands in the job
    #[arg(long)]
    pub no_debug: bool,

    /// Info file prefix
    #[arg(long)]
    pub infofile: Option<String>,
}

impl ArthurArgs {
    /// Parameters given on the command line; unset ones stay None.
    pub fn to_params(&self) -> ArthurParams {
        let common = &self.common;
        ArthurParams {
            program: common.program.clone(),
            job_dir: common.job_dir.clone(),
            name: common.name.clone(),
            walltime: common.walltime.as_deref().map(WalltimeSetting::from_arg),
            ncpu: self.ncpu,
            memory: self.memory.as_deref().map(MemorySetting::from_arg),
            copy: non_empty(&self.copy),
            copyback: non_empty(&self.copyback),
            copyback_export: non_empty(&self.copyback_export),
            export_dir: self.export_dir.clone(),
            node_features: non_empty(&self.node_features),
            exclude_nodes: non_empty(&common.exclude_nodes),
            email: toggle(self.email, self.no_email),
            email_address: self.email_address.clone(),
            debug: toggle(false, self.no_debug),
            result_dir: self.result_dir.clone(),
            infofile: self.infofile.clone(),
            cleanup: toggle(self.cleanup, false),
            export_variables: non_empty(&common.export_variables),
            setup: non_empty(&common.setup),
            precmd: non_empty(&common.precmd),
            cmd: non_empty(&common.cmd),
            postcmd: non_empty(&common.postcmd),
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct LinuxClusterArgs {
    #[command(flatten)]
    pub common: CommonSubmitArgs,

    /// Number of nodes
    #[arg(long)]
    pub nnodes: Option<u32>,

    /// Target cluster: mpp1, mpp2 or serial
    #[arg(long)]
    pub clusters: Option<String>,

    /// Notification address
    #[arg(long)]
    pub email_address: Option<String>,

    /// Files removed at the end of the job
    #[arg(long, num_args = 1..)]
    pub clean: Vec<String>,

    /// Output file (default: <job_dir>/<name>.%j.%N.out)
    #[arg(short, long)]
    pub outfile: Option<String>,

    /// Module to load (repeatable)
    #[arg(long = "load-module")]
    pub load_modules: Vec<String>,

    /// Module to unload first (repeatable)
    #[arg(long = "unload-module")]
    pub unload_modules: Vec<String>,

    /// Do not trace commands in the job
    #[arg(long)]
    pub no_debug: bool,
}

impl LinuxClusterArgs {
    /// Parameters given on the command line; unset ones stay None.
    pub fn to_params(&self) -> LinuxClusterParams {
        let common = &self.common;
        LinuxClusterParams {
            program: common.program.clone(),
            job_dir: common.job_dir.clone(),
            name: common.name.clone(),
            walltime: common.walltime.as_deref().map(WalltimeSetting::from_arg),
            nnodes: self.nnodes,
            clusters: self.clusters.clone(),
            email_address: self.email_address.clone(),
            clean: non_empty(&self.clean),
            debug: toggle(false, self.no_debug),
            outfile: self.outfile.clone(),
            load_modules: non_empty(&self.load_modules),
            unload_modules: non_empty(&self.unload_modules),
            exclude_nodes: non_empty(&common.exclude_nodes),
            export_variables: non_empty(&common.export_variables),
            setup: non_empty(&common.setup),
            precmd: non_empty(&common.precmd),
            cmd: non_empty(&common.cmd),
            postcmd: non_empty(&common.postcmd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_myq() {
        let args = Args::parse_from(["rtools", "-vv", "myq", "2", "--list", "--user", "alice"]);
        assert_eq!(args.verbose, 2);
        match args.command {
            Command::Myq(myq) => {
                assert_eq!(myq.index, Some(2));
                assert!(myq.list);
                assert_eq!(myq.user, "alice");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_arthur() {
        let args = Args::parse_from([
            "rtools", "submit", "arthur", "-p", "aims.x", "-t", "10", "-m", "2", "-x", "tick1",
            "tick2", "--depend", "1.arthur", "2.arthur", "--no-email", "-d",
        ]);
        let Command::Submit(SubmitArgs {
            agent: SubmitAgent::Arthur(arthur),
        }) = args.command
        else {
            panic!("expected submit arthur");
        };
        assert!(arthur.common.dryrun);
        assert_eq!(arthur.common.depend, vec!["1.arthur", "2.arthur"]);

        let params = arthur.to_params();
        assert_eq!(params.program.as_deref(), Some("aims.x"));
        assert_eq!(params.walltime, Some(WalltimeSetting::Hours(10)));
        assert_eq!(params.memory, Some(MemorySetting::Gigabytes(2)));
        assert_eq!(
            params.exclude_nodes,
            Some(vec!["tick1".to_string(), "tick2".to_string()])
        );
        assert_eq!(params.email, Some(false));
        assert_eq!(params.copy, None);
        assert_eq!(params.debug, None);
    }

    #[test]
    fn test_parse_linuxcluster() {
        let args = Args::parse_from([
            "rtools",
            "submit",
            "linuxcluster",
            "--clusters",
            "mpp2",
            "--nnodes",
            "4",
            "-t",
            "24:00:00",
            "--load-module",
            "mkl",
            "--load-module",
            "mpi.intel",
        ]);
        let Command::Submit(SubmitArgs {
            agent: SubmitAgent::Linuxcluster(lc),
        }) = args.command
        else {
            panic!("expected submit linuxcluster");
        };
        let params = lc.to_params();
        assert_eq!(params.nnodes, Some(4));
        assert_eq!(params.walltime, Some(WalltimeSetting::from("24:00:00")));
        assert_eq!(
            params.load_modules,
            Some(vec!["mkl".to_string(), "mpi.intel".to_string()])
        );
    }

    #[test]
    fn test_parse_build() {
        let args = Args::parse_from([
            "rtools",
            "build",
            "--compiler",
            "gnu",
            "--scalapack",
            "-j",
            "8",
            "--dry-run",
            "FFLAGS=-O0",
        ]);
        let Command::Build(build) = args.command else {
            panic!("expected build");
        };
        assert_eq!(build.compiler, Compiler::Gnu);
        assert!(build.scalapack);
        assert_eq!(build.jobs, 8);
        assert_eq!(build.overrides, vec!["FFLAGS=-O0"]);
    }

    #[test]
    fn test_parse_scheduler_option() {
        let args = Args::parse_from(["rtools", "nodes", "--scheduler", "pbs"]);
        let Command::Nodes(nodes) = args.command else {
            panic!("expected nodes");
        };
        assert_eq!(nodes.scheduler, Some(Scheduler::Pbs));
        assert!(Args::try_parse_from(["rtools", "nodes", "--scheduler", "lsf"]).is_err());
    }
}
