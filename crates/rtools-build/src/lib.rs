//! Build wrapper for the electronic-structure code's make-based build.
//!
//! Picks compiler and math library flags for a build profile and passes
//! them to `make` as variable assignments.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tokio::process::Command;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("MKLROOT is not set; load the Intel MKL environment or use --compiler gnu")]
    MissingMklRoot,
    #[error("Unknown compiler '{0}' (expected intel or gnu)")]
    UnknownCompiler(String),
    #[error("Invalid variable override '{0}': expected VAR=value")]
    InvalidOverride(String),
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compiler {
    #[default]
    Intel,
    Gnu,
}

impl FromStr for Compiler {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "intel" | "ifort" => Ok(Compiler::Intel),
            "gnu" | "gfortran" => Ok(Compiler::Gnu),
            other => Err(BuildError::UnknownCompiler(other.to_string())),
        }
    }
}

impl fmt::Display for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compiler::Intel => write!(f, "intel"),
            Compiler::Gnu => write!(f, "gnu"),
        }
    }
}

/// make target of the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Serial,
    Mpi,
    ScalapackMpi,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Serial => "serial",
            Target::Mpi => "mpi",
            Target::ScalapackMpi => "scalapack.mpi",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler and parallelization choice for one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildProfile {
    pub compiler: Compiler,
    pub mpi: bool,
    /// Implies MPI
    pub scalapack: bool,
}

impl BuildProfile {
    pub fn uses_mpi(&self) -> bool {
        self.mpi || self.scalapack
    }

    pub fn target(&self) -> Target {
        if self.scalapack {
            Target::ScalapackMpi
        } else if self.mpi {
            Target::Mpi
        } else {
            Target::Serial
        }
    }

    /// make variables for this profile, in the order they are passed.
    ///
    /// Intel builds link MKL and need its install prefix.
    pub fn variables(&self, mklroot: Option<&str>) -> Result<Vec<(String, String)>, BuildError> {
        let mut vars: Vec<(&str, String)> = Vec::new();

        match self.compiler {
            Compiler::Intel => {
                let mkl = mklroot
                    .filter(|root| !root.trim().is_empty())
                    .ok_or(BuildError::MissingMklRoot)?;
                let mkl_lib = format!("-L{}/lib/intel64", mkl);
                let fflags = "-O3 -ip -fp-model precise".to_string();
                vars.push(("FC", "ifort".to_string()));
                vars.push(("FFLAGS", fflags.clone()));
                vars.push(("F90FLAGS", fflags));
                vars.push(("ARCHITECTURE", "Generic".to_string()));
                vars.push((
                    "LAPACKBLAS",
                    format!("{} -lmkl_intel_lp64 -lmkl_sequential -lmkl_core", mkl_lib),
                ));
                if self.uses_mpi() {
                    vars.push(("MPIFC", "mpiifort".to_string()));
                    vars.push(("USE_MPI", "yes".to_string()));
                }
                if self.scalapack {
                    vars.push((
                        "SCALAPACK",
                        format!("{} -lmkl_scalapack_lp64 -lmkl_blacs_intelmpi_lp64", mkl_lib),
                    ));
                }
            }
            Compiler::Gnu => {
                let fflags = "-O2 -ffree-line-length-none".to_string();
                vars.push(("FC", "gfortran".to_string()));
                vars.push(("FFLAGS", fflags.clone()));
                vars.push(("F90FLAGS", fflags));
                vars.push(("ARCHITECTURE", "Generic".to_string()));
                vars.push(("LAPACKBLAS", "-llapack -lblas".to_string()));
                if self.uses_mpi() {
                    vars.push(("MPIFC", "mpif90".to_string()));
                    vars.push(("USE_MPI", "yes".to_string()));
                }
                if self.scalapack {
                    vars.push(("SCALAPACK", "-lscalapack".to_string()));
                }
            }
        }

        Ok(vars
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect())
    }
}

/// Parse a `VAR=value` override.
pub fn parse_override(s: &str) -> Result<(String, String), BuildError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(BuildError::InvalidOverride(s.to_string())),
    }
}

/// One `make` call, ready to print or run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeInvocation {
    pub program: String,
    pub src: PathBuf,
    pub jobs: usize,
    pub target: Target,
    pub variables: Vec<(String, String)>,
}

impl MakeInvocation {
    /// Build the invocation for `profile`; overrides replace profile
    /// variables of the same name or are appended.
    pub fn new(
        profile: &BuildProfile,
        src: PathBuf,
        jobs: usize,
        mklroot: Option<&str>,
        overrides: &[String],
    ) -> Result<Self, BuildError> {
        let mut variables = profile.variables(mklroot)?;
        for item in overrides {
            let (key, value) = parse_override(item)?;
            match variables.iter_mut().find(|(k, _)| *k == key) {
                Some(existing) => existing.1 = value,
                None => variables.push((key, value)),
            }
        }

        Ok(Self {
            program: "make".to_string(),
            src,
            jobs: jobs.max(1),
            target: profile.target(),
            variables,
        })
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "-C".to_string(),
            self.src.display().to_string(),
            "-j".to_string(),
            self.jobs.to_string(),
            self.target.to_string(),
        ];
        args.extend(
            self.variables
                .iter()
                .map(|(key, value)| format!("{}={}", key, value)),
        );
        args
    }

    /// Shell-readable form for `--dry-run`.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in self.args() {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                match arg.split_once('=') {
                    Some((key, value)) if !key.contains(char::is_whitespace) => {
                        line.push_str(&format!("{}=\"{}\"", key, value));
                    }
                    _ => line.push_str(&format!("\"{}\"", arg)),
                }
            } else {
                line.push_str(&arg);
            }
        }
        line
    }

    /// Run make with inherited stdio and return its exit status.
    ///
    /// Termination by a signal is reported as status 1.
    pub async fn run(&self) -> Result<i32, BuildError> {
        tracing::debug!("running {}", self.command_line());
        let status = Command::new(&self.program)
            .args(self.args())
            .status()
            .await
            .map_err(|source| BuildError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        Ok(status.code().unwrap_or(1))
    }
}
