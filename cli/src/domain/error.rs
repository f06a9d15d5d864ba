//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! Adapter failures arrive here as `anyhow::Error` causes so the full context
//! chain survives into the final message.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::machine::MachineState;
use crate::domain::pipeline::ExecutionRecord;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while validating the run configuration, before any side effect.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("must provide --{flag} for the instance")]
    Missing { flag: &'static str },

    #[error("invalid value for --{flag}: {value:?} ({reason})")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: &'static str,
    },
}

// ── Run errors ────────────────────────────────────────────────────────────────

/// The workflow stage a run was in when it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Launch,
    Readiness,
    Address,
    Connect,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Launch => "launch",
            Self::Readiness => "readiness wait",
            Self::Address => "address lookup",
            Self::Connect => "ssh connect",
            Self::Pipeline => "command pipeline",
        })
    }
}

/// Every way a runner job can fail.
///
/// All variants except `Cleanup` are fatal. `Cleanup` is reported alongside a
/// run's outcome and never replaces an earlier error.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("creating ssh key pair: {cause:#}")]
    KeyGeneration { cause: anyhow::Error },

    #[error("failed to create machine: {cause:#}")]
    Provision { cause: anyhow::Error },

    #[error(
        "failed to wait for instance to be ready: {instance_id} still {last_state} after {}s",
        .waited.as_secs()
    )]
    ReadinessTimeout {
        instance_id: String,
        waited: Duration,
        last_state: MachineState,
    },

    #[error("instance {instance_id} entered state {state} before becoming ready")]
    InstanceFailed {
        instance_id: String,
        state: MachineState,
    },

    #[error("cannot find ip for instance {instance_id}: {detail}")]
    AddressUnavailable { instance_id: String, detail: String },

    #[error("failed to connect to ssh on {address:?} after {attempts} attempt(s): {cause:#}")]
    Connectivity {
        address: String,
        attempts: u32,
        cause: anyhow::Error,
    },

    #[error("running command #{} {command:?}: {cause:#}{}", .index + 1, output_suffix(.output))]
    Command {
        /// Zero-based position of the failing command.
        index: usize,
        /// The command template (never the substituted text).
        command: String,
        /// Redacted tail of the captured output.
        output: String,
        cause: anyhow::Error,
        /// Records of every command issued, the failing one last.
        records: Vec<ExecutionRecord>,
    },

    #[error("run cancelled during {stage}")]
    Cancelled { stage: Stage },

    #[error("failed to delete machine {instance_id}: {cause:#}")]
    Cleanup {
        instance_id: String,
        cause: anyhow::Error,
    },
}

fn output_suffix(output: &str) -> String {
    if output.trim().is_empty() {
        String::new()
    } else {
        format!("\n--- output ---\n{output}")
    }
}
