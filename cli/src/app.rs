//! Application context: the production adapters wired together once.
//!
//! `AppContext` is built in `Cli::run()` and handed to the command handler,
//! which passes its parts to the application services as port
//! implementations.

use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::keys::Ed25519KeyProvider;
use crate::infra::provisioner::OciCliProvisioner;
use crate::infra::ssh::{DEFAULT_CONNECT_TIMEOUT, RusshConnector};
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
}

/// Adapter settings taken from the command line.
pub struct AdapterFlags {
    /// Path or name of the cloud command-line client.
    pub oci_cli: String,
    /// Account used for SSH logins.
    pub login_user: String,
}

/// Unified application context passed to the command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Cloud compute adapter.
    pub provisioner: OciCliProvisioner<TokioCommandRunner>,
    /// Ephemeral key source.
    pub keys: Ed25519KeyProvider,
    /// SSH session factory.
    pub connector: RusshConnector,
}

impl AppContext {
    #[must_use]
    pub fn new(output: &OutputFlags, adapters: &AdapterFlags) -> Self {
        Self {
            output: OutputContext::new(output.no_color, output.quiet),
            provisioner: OciCliProvisioner::default_runner(adapters.oci_cli.as_str()),
            keys: Ed25519KeyProvider,
            connector: RusshConnector::new(adapters.login_user.as_str(), DEFAULT_CONNECT_TIMEOUT),
        }
    }

    /// A progress reporter writing to this context's terminal.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }
}
