//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::app::{AdapterFlags, AppContext, OutputFlags};
use crate::commands;
use crate::domain::config::LOGIN_USER;

/// Run one GitHub Actions job on an ephemeral GPU instance, then delete it
#[derive(Parser)]
#[command(name = "gha-gpu-runner", version)]
pub struct Cli {
    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    #[command(flatten)]
    pub args: commands::run::RunArgs,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the run fails.
    pub async fn run(self) -> Result<()> {
        let Cli { quiet, no_color, args } = self;
        init_tracing(args.debug);

        let app = AppContext::new(
            &OutputFlags { no_color, quiet },
            &AdapterFlags {
                oci_cli: args.oci_cli.clone(),
                login_user: LOGIN_USER.to_string(),
            },
        );
        commands::run::run(&app, &args).await
    }
}

/// Log to stderr. `RUST_LOG` wins; otherwise `debug` picks the level for
/// this crate and everything else stays at `warn`.
fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,gpu_runner={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
