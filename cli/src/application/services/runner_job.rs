//! The runner job use-case: one ephemeral instance, one pipeline, guaranteed
//! teardown.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{compute, pipeline, remote};
use crate::application::ports::{
    ComputeProvider, KeyProvider, ProgressReporter, RemoteConnector, RemoteSession,
};
use crate::domain::{
    CommandSpec, ExecutionRecord, KeyPair, LaunchSpec, Machine, RunError, RunnerConfig, Stage,
    Substitutions,
};

/// Everything one job needs, built once by the caller.
#[derive(Debug, Clone)]
pub struct JobPlan {
    pub config: RunnerConfig,
    pub commands: CommandSpec,
    pub substitutions: Substitutions,
}

/// Outcome of a successful job.
#[derive(Debug)]
pub struct RunReport {
    pub instance_id: String,
    pub records: Vec<ExecutionRecord>,
    /// Set when the pipeline succeeded but the delete request did not.
    pub cleanup_error: Option<String>,
}

/// Run one job end to end.
///
/// Validation, key generation and the launch request happen first; nothing
/// needs cleaning up if any of them fail. Once an instance exists, exactly one
/// delete is attempted on every exit path (including a panic in the body)
/// before this function returns. A delete failure is reported but never
/// replaces the body's outcome.
///
/// # Errors
///
/// Returns the first fatal `RunError` of the run.
pub async fn run_job<P, K, C>(
    provider: &P,
    keys: &K,
    connector: &C,
    reporter: &impl ProgressReporter,
    plan: &JobPlan,
    cancel: &CancellationToken,
) -> Result<RunReport, RunError>
where
    P: ComputeProvider,
    K: KeyProvider,
    C: RemoteConnector,
{
    plan.config.validate()?;

    let key = keys
        .generate()
        .map_err(|cause| RunError::KeyGeneration { cause })?;
    let spec = LaunchSpec::new(
        &plan.config.instance,
        key.public_key(),
        chrono::Local::now().naive_local(),
    );

    if cancel.is_cancelled() {
        return Err(RunError::Cancelled {
            stage: Stage::Launch,
        });
    }
    reporter.step(&format!("launching {} ({})", spec.display_name, spec.shape));
    let mut machine = compute::launch(provider, &spec).await?;
    reporter.success(&format!("instance {} created", machine.id()));

    let outcome = AssertUnwindSafe(drive(
        provider,
        connector,
        reporter,
        plan,
        &key,
        &mut machine,
        cancel,
    ))
    .catch_unwind()
    .await;

    reporter.step(&format!("deleting instance {}", machine.id()));
    let cleanup_error =
        match compute::delete(provider, &mut machine, plan.config.cleanup_timeout).await {
            Ok(()) => {
                reporter.success("instance deleted");
                None
            }
            Err(err) => {
                let message = err.to_string();
                warn!(instance_id = machine.id(), error = %message, "cleanup failed");
                reporter.warn(&message);
                Some(message)
            }
        };

    match outcome {
        Ok(Ok(records)) => Ok(RunReport {
            instance_id: machine.id().to_string(),
            records,
            cleanup_error,
        }),
        Ok(Err(err)) => Err(err),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// The part of the job that runs while an instance exists.
async fn drive<P, C>(
    provider: &P,
    connector: &C,
    reporter: &impl ProgressReporter,
    plan: &JobPlan,
    key: &KeyPair,
    machine: &mut Machine,
    cancel: &CancellationToken,
) -> Result<Vec<ExecutionRecord>, RunError>
where
    P: ComputeProvider,
    C: RemoteConnector,
{
    reporter.step("waiting for instance to be running");
    compute::wait_until_ready(provider, machine, &plan.config.readiness, cancel).await?;
    let address = compute::external_address(provider, machine, cancel).await?;
    reporter.success(&format!("instance running at {address}"));

    reporter.step(&format!("connecting to {}@{address}", plan.config.login_user));
    let mut session =
        remote::connect_with_retry(connector, machine, key, &plan.config.connect, cancel).await?;

    reporter.step(&format!("running {} command(s)", plan.commands.len()));
    let result = pipeline::run(&mut session, &plan.commands, &plan.substitutions, cancel).await;
    if let Err(err) = session.close().await {
        warn!(error = %format!("{err:#}"), "closing ssh session failed");
    }
    let records = result?;
    info!(instance_id = machine.id(), commands = records.len(), "pipeline finished");
    reporter.success(&format!("{} command(s) succeeded", records.len()));
    Ok(records)
}
