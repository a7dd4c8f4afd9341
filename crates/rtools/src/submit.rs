//! `rtools submit`: resolve parameters and run a submit agent.

use crate::failure::with_status;
use miette::{IntoDiagnostic, Result};
use rtools_cli::{CommonSubmitArgs, SubmitAgent, SubmitArgs};
use rtools_submit::{
    ArthurJob, ArthurParams, Dependency, DependencyType, HostContext, LinuxClusterJob,
    LinuxClusterParams, Overlay, SubmitError, load_defaults,
};
use serde::de::DeserializeOwned;

pub async fn run(args: SubmitArgs) -> Result<i32> {
    let host = HostContext::detect().into_diagnostic()?;

    let (outcome, command) = match args.agent {
        SubmitAgent::Arthur(arthur) => {
            let params: ArthurParams = resolve_params(
                rtools_submit::arthur::AGENT,
                &arthur.common,
                arthur.to_params(),
                &host,
            )?;
            let job = ArthurJob::from_params(params, &host).into_diagnostic()?;
            let dependency = dependency(&arthur.common)?;
            (
                job.submit(dependency.as_ref(), arthur.common.dryrun).await,
                "qsub",
            )
        }
        SubmitAgent::Linuxcluster(lc) => {
            let params: LinuxClusterParams = resolve_params(
                rtools_submit::linuxcluster::AGENT,
                &lc.common,
                lc.to_params(),
                &host,
            )?;
            let job = LinuxClusterJob::from_params(params, &host).into_diagnostic()?;
            let dependency = dependency(&lc.common)?;
            (
                job.submit(dependency.as_ref(), lc.common.dryrun).await,
                "sbatch",
            )
        }
    };

    let outcome = with_status(outcome, command, SubmitError::status)?;
    match (&outcome.job_id, &outcome.cluster) {
        (Some(job_id), Some(cluster)) => println!("{} (cluster {})", job_id, cluster),
        (Some(job_id), None) => println!("{}", job_id),
        (None, _) => println!(
            "prepared but not submitted: {}",
            outcome.job_file.display()
        ),
    }
    Ok(outcome.status)
}

/// Command line over defaults files over built-in defaults.
fn resolve_params<T>(
    agent: &str,
    common: &CommonSubmitArgs,
    cli: T,
    host: &HostContext,
) -> Result<T>
where
    T: DeserializeOwned + Default + Overlay,
{
    if common.no_defaults {
        return Ok(cli);
    }
    let defaults: T = load_defaults(agent, Some(&host.home), &host.cwd).into_diagnostic()?;
    Ok(defaults.overlay(cli))
}

fn dependency(common: &CommonSubmitArgs) -> Result<Option<Dependency>> {
    if common.depend.is_empty() {
        return Ok(None);
    }
    let kind: DependencyType = common.depend_type.parse().into_diagnostic()?;
    Ok(Some(Dependency::new(kind, common.depend.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_from_args() {
        let mut common = CommonSubmitArgs {
            depend_type: "afterany".to_string(),
            ..Default::default()
        };
        assert!(dependency(&common).unwrap().is_none());

        common.depend = vec!["1.arthur".to_string(), "2.arthur".to_string()];
        let dep = dependency(&common).unwrap().unwrap();
        assert_eq!(dep.render().as_deref(), Some("afterany:1.arthur:2.arthur"));

        common.depend_type = "before".to_string();
        assert!(dependency(&common).is_err());
    }
}
