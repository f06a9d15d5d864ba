//! Instance lifecycle operations: launch, wait for ready, address, delete.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pause;
use crate::application::ports::ComputeProvider;
use crate::domain::{LaunchSpec, Machine, MachineState, ReadinessPolicy, RunError, Stage};

/// Issue the create-instance request.
///
/// # Errors
///
/// Returns `RunError::Provision` if the provider rejects the request or the
/// response carries no instance id. Nothing exists to clean up in that case.
pub async fn launch(
    provider: &impl ComputeProvider,
    spec: &LaunchSpec,
) -> Result<Machine, RunError> {
    let record = provider
        .launch(spec)
        .await
        .map_err(|cause| RunError::Provision { cause })?;
    if record.id.trim().is_empty() {
        return Err(RunError::Provision {
            cause: anyhow::anyhow!("launch response carried no instance id"),
        });
    }

    let mut machine = Machine::provisioning(record.id);
    if let Some(state) = MachineState::from_provider(&record.lifecycle_state) {
        machine.observe(state);
    }
    info!(
        instance_id = machine.id(),
        display_name = %spec.display_name,
        state = %machine.state(),
        "instance launched"
    );
    Ok(machine)
}

/// Poll the provider until `machine` reports running.
///
/// Sleeps `policy.grace_period` before the first poll, then polls every
/// `policy.poll_interval` for at most `policy.timeout`. A failed describe call
/// is logged and retried on the next tick. A describe call still in flight at
/// the deadline is abandoned.
///
/// # Errors
///
/// - `RunError::ReadinessTimeout` when the budget elapses; `machine` keeps
///   the last observed state.
/// - `RunError::InstanceFailed` when the instance reaches a state that can
///   no longer become running.
/// - `RunError::Cancelled` when `cancel` fires.
pub async fn wait_until_ready(
    provider: &impl ComputeProvider,
    machine: &mut Machine,
    policy: &ReadinessPolicy,
    cancel: &CancellationToken,
) -> Result<(), RunError> {
    debug!(grace_secs = policy.grace_period.as_secs(), "waiting before first poll");
    pause(policy.grace_period, cancel, Stage::Readiness).await?;

    let started = Instant::now();
    let deadline = started + policy.timeout;
    let timed_out = |machine: &Machine| RunError::ReadinessTimeout {
        instance_id: machine.id().to_string(),
        waited: Instant::now() - started,
        last_state: machine.state(),
    };
    loop {
        let described = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(RunError::Cancelled { stage: Stage::Readiness });
            }
            () = tokio::time::sleep_until(deadline) => return Err(timed_out(machine)),
            r = provider.describe(machine.id()) => r,
        };
        match described {
            Ok(record) => match MachineState::from_provider(&record.lifecycle_state) {
                Some(state) => machine.observe(state),
                None => debug!(
                    instance_id = machine.id(),
                    lifecycle_state = %record.lifecycle_state,
                    "unrecognised lifecycle state"
                ),
            },
            Err(err) => warn!(
                instance_id = machine.id(),
                error = %format!("{err:#}"),
                "describing instance failed; retrying"
            ),
        }

        let state = machine.state();
        if state == MachineState::Running {
            info!(
                instance_id = machine.id(),
                waited_secs = started.elapsed().as_secs(),
                "instance running"
            );
            return Ok(());
        }
        if !state.can_become_running() {
            return Err(RunError::InstanceFailed {
                instance_id: machine.id().to_string(),
                state,
            });
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(machine));
        }
        debug!(instance_id = machine.id(), state = %state, "instance not ready yet");
        pause(policy.poll_interval.min(deadline - now), cancel, Stage::Readiness).await?;
    }
}

/// Look up and record the machine's public address.
///
/// # Errors
///
/// - `RunError::AddressUnavailable` if the lookup fails or no public address
///   has been assigned.
/// - `RunError::Cancelled` when `cancel` fires during the lookup.
pub async fn external_address(
    provider: &impl ComputeProvider,
    machine: &mut Machine,
    cancel: &CancellationToken,
) -> Result<String, RunError> {
    let unavailable = |detail: String| RunError::AddressUnavailable {
        instance_id: machine.id().to_string(),
        detail,
    };
    let looked_up = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(RunError::Cancelled { stage: Stage::Address }),
        r = provider.public_address(machine.id()) => r,
    };
    let address = match looked_up {
        Ok(Some(address)) if !address.trim().is_empty() => address.trim().to_string(),
        Ok(_) => return Err(unavailable("no public address assigned".to_string())),
        Err(err) => return Err(unavailable(format!("{err:#}"))),
    };
    machine.set_external_address(address.clone());
    info!(instance_id = machine.id(), address = %address, "resolved external address");
    Ok(address)
}

/// Request termination of `machine`, bounded by `timeout`.
///
/// The request is sent whatever state was last observed; termination is
/// idempotent on the provider side, and a not-found answer surfaces as a
/// cleanup error.
///
/// # Errors
///
/// Returns `RunError::Cleanup` if the request fails or times out. Callers
/// log it; it never replaces an earlier error.
pub async fn delete(
    provider: &impl ComputeProvider,
    machine: &mut Machine,
    timeout: Duration,
) -> Result<(), RunError> {
    let cleanup = |cause: anyhow::Error| RunError::Cleanup {
        instance_id: machine.id().to_string(),
        cause,
    };
    match tokio::time::timeout(timeout, provider.terminate(machine.id())).await {
        Ok(Ok(())) => {}
        Ok(Err(cause)) => return Err(cleanup(cause)),
        Err(_) => {
            return Err(cleanup(anyhow::anyhow!(
                "terminate request timed out after {}s",
                timeout.as_secs()
            )));
        }
    }
    machine.observe(MachineState::Terminating);
    info!(instance_id = machine.id(), "instance termination requested");
    Ok(())
}
