//! Fail-fast execution of the command pipeline over one session.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::anyhow;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::application::ports::{CommandOutput, RemoteSession};
use crate::domain::pipeline::tail_lines;
use crate::domain::{CommandSpec, ExecutionRecord, RunError, Stage, Substitutions};

/// Lines of captured output kept in a command failure message.
const FAILURE_OUTPUT_LINES: usize = 20;

/// Run every command in `spec`, in order, stopping at the first failure.
///
/// Each template is expanded with `substitutions` immediately before it is
/// issued. Only templates are logged; captured output is redacted before it
/// is logged or attached to an error.
///
/// # Errors
///
/// - `RunError::Command` for the first command that exits non-zero, ends
///   without an exit status, or loses its transport. It carries every record
///   produced so far, the failing one last.
/// - `RunError::Cancelled` when `cancel` fires; the in-flight command is
///   abandoned.
pub async fn run<S: RemoteSession>(
    session: &mut S,
    spec: &CommandSpec,
    substitutions: &Substitutions,
    cancel: &CancellationToken,
) -> Result<Vec<ExecutionRecord>, RunError> {
    let total = spec.len();
    let mut records = Vec::with_capacity(total);

    for (index, template) in spec.commands().iter().enumerate() {
        let issued = substitutions.expand(template);
        info!(index = index + 1, total, command = %template, "running command");

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RunError::Cancelled { stage: Stage::Pipeline }),
            r = session.run(&issued) => r,
        };
        let (output, transport_error) = match result {
            Ok(output) => (output, None),
            Err(err) => (CommandOutput::default(), Some(err)),
        };

        let record = ExecutionRecord {
            index,
            command: template.clone(),
            issued,
            output: output.output,
            exit_status: output.exit_status,
        };
        let redacted = substitutions.redact(&record.output_lossy());
        debug!(
            index = index + 1,
            exit_status = ?record.exit_status,
            output = %redacted,
            "command finished"
        );

        let cause = match (transport_error, record.exit_status) {
            (Some(err), _) => err,
            (None, Some(0)) => {
                records.push(record);
                continue;
            }
            (None, Some(code)) => anyhow!("exit status {code}"),
            (None, None) => anyhow!("command ended without an exit status"),
        };
        records.push(record);
        return Err(RunError::Command {
            index,
            command: template.clone(),
            output: tail_lines(&redacted, FAILURE_OUTPUT_LINES),
            cause,
            records,
        });
    }

    info!(total, "all commands succeeded");
    Ok(records)
}
