//! `rtools build`: run make with a compiler profile.

use miette::{IntoDiagnostic, Result};
use rtools_build::{BuildProfile, MakeInvocation};
use rtools_cli::BuildArgs;

pub async fn run(args: BuildArgs) -> Result<i32> {
    let profile = BuildProfile {
        compiler: args.compiler,
        mpi: args.mpi,
        scalapack: args.scalapack,
    };
    let mklroot = std::env::var("MKLROOT").ok();
    let make = MakeInvocation::new(
        &profile,
        args.src,
        args.jobs,
        mklroot.as_deref(),
        &args.overrides,
    )
    .into_diagnostic()?;

    if args.dry_run {
        println!("{}", make.command_line());
        return Ok(0);
    }

    tracing::info!("building target {} with {}", make.target, profile.compiler);
    make.run().await.into_diagnostic()
}
