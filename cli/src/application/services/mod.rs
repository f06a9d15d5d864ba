//! Application services: use-case orchestration.
//!
//! Each service module implements one part of the runner job by composing
//! domain logic with port trait calls. Services import only from
//! `crate::domain` and `crate::application::ports`, never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

pub mod compute;
pub mod pipeline;
pub mod remote;
pub mod runner_job;

#[cfg(test)]
pub(crate) mod test_support;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::{RunError, Stage};

/// Sleep for `duration` unless `cancel` fires first.
pub(crate) async fn pause(
    duration: Duration,
    cancel: &CancellationToken,
    stage: Stage,
) -> Result<(), RunError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(RunError::Cancelled { stage }),
        () = tokio::time::sleep(duration) => Ok(()),
    }
}
