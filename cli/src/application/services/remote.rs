//! Bounded-retry SSH connection establishment.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::anyhow;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::pause;
use crate::application::ports::RemoteConnector;
use crate::domain::{KeyPair, Machine, RetryPolicy, RunError, Stage};

/// Open a session to `machine`, retrying under `policy`.
///
/// The connector is only called once the machine is observed running with a
/// non-empty address. Each attempt is bounded by the smaller of
/// `policy.attempt_timeout` and the time left before `policy.deadline`. No
/// backoff is taken that would end past the deadline.
///
/// # Errors
///
/// - `RunError::AddressUnavailable` if the machine has no usable target.
/// - `RunError::Connectivity` once attempts or the deadline are exhausted,
///   carrying the last attempt's failure.
/// - `RunError::Cancelled` when `cancel` fires.
pub async fn connect_with_retry<C: RemoteConnector>(
    connector: &C,
    machine: &Machine,
    key: &KeyPair,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<C::Session, RunError> {
    let Some(address) = machine.ssh_target() else {
        return Err(RunError::AddressUnavailable {
            instance_id: machine.id().to_string(),
            detail: format!("instance is {} with no usable address", machine.state()),
        });
    };

    let deadline = Instant::now() + policy.deadline;
    let mut attempts: u32 = 0;
    let mut last_error = anyhow!("no connection attempt was made");

    while attempts < policy.max_attempts {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        attempts += 1;
        let budget = policy.attempt_timeout.min(deadline - now);
        debug!(address, attempt = attempts, budget_secs = budget.as_secs(), "dialing ssh");

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RunError::Cancelled { stage: Stage::Connect }),
            r = tokio::time::timeout(budget, connector.connect(address, key)) => r,
        };
        match outcome {
            Ok(Ok(session)) => {
                info!(address, attempt = attempts, "ssh session established");
                return Ok(session);
            }
            Ok(Err(err)) => last_error = err,
            Err(_) => last_error = anyhow!("attempt timed out after {}s", budget.as_secs()),
        }
        warn!(
            address,
            attempt = attempts,
            max_attempts = policy.max_attempts,
            error = %format!("{last_error:#}"),
            "ssh connection attempt failed"
        );

        if attempts >= policy.max_attempts || Instant::now() + policy.backoff >= deadline {
            break;
        }
        pause(policy.backoff, cancel, Stage::Connect).await?;
    }

    Err(RunError::Connectivity {
        address: address.to_string(),
        attempts,
        cause: last_error,
    })
}
