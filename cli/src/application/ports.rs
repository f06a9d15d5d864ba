//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::process::Output;

use anyhow::Result;

use crate::domain::{KeyPair, LaunchSpec};

// ── Value Types ───────────────────────────────────────────────────────────────

/// What the provider reports about an instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    /// Opaque instance identifier.
    pub id: String,
    /// Raw provider lifecycle string, e.g. `"PROVISIONING"`.
    pub lifecycle_state: String,
}

/// Captured result of one remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Remote exit status; `None` if the channel closed without reporting one.
    pub exit_status: Option<u32>,
    /// Combined stdout and stderr in arrival order.
    pub output: Vec<u8>,
}

// ── Compute Port ──────────────────────────────────────────────────────────────

/// The four cloud capabilities the runner depends on.
#[allow(async_fn_in_trait)]
pub trait ComputeProvider {
    /// Issue the create-instance request.
    async fn launch(&self, spec: &LaunchSpec) -> Result<InstanceRecord>;
    /// Fetch the current state of an instance.
    async fn describe(&self, instance_id: &str) -> Result<InstanceRecord>;
    /// The instance's public address, `None` until one is assigned.
    async fn public_address(&self, instance_id: &str) -> Result<Option<String>>;
    /// Request termination of the instance and its boot volume.
    async fn terminate(&self, instance_id: &str) -> Result<()>;
}

// ── Key Port ──────────────────────────────────────────────────────────────────

/// Produces a fresh key pair on every call.
pub trait KeyProvider {
    /// # Errors
    ///
    /// Returns an error if the system random source fails.
    fn generate(&self) -> Result<KeyPair>;
}

// ── Remote Execution Ports ────────────────────────────────────────────────────

/// An authenticated remote session running one command at a time.
#[allow(async_fn_in_trait)]
pub trait RemoteSession: Sized {
    /// Run `command` to completion and capture its output.
    ///
    /// Transport failures are errors; a non-zero exit is reported through
    /// `CommandOutput::exit_status`.
    async fn run(&mut self, command: &str) -> Result<CommandOutput>;
    /// Release the transport.
    async fn close(self) -> Result<()>;
}

/// Makes a single attempt to open a session. Retries live in the caller.
#[allow(async_fn_in_trait)]
pub trait RemoteConnector {
    type Session: RemoteSession;

    /// Dial `address` and authenticate with `key`.
    async fn connect(&self, address: &str, key: &KeyPair) -> Result<Self::Session>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
