//! Run command: one job on one ephemeral GPU instance.

use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Args};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::app::AppContext;
use crate::application::services::runner_job::{JobPlan, RunReport, run_job};
use crate::domain::config::{
    DEFAULT_ARCH, DEFAULT_AVAILABILITY_DOMAIN, DEFAULT_BOOT_VOLUME_SIZE_GBS, DEFAULT_COMPARTMENT_ID,
    DEFAULT_SHAPE, DEFAULT_SUBNET_ID, LOGIN_USER,
};
use crate::domain::pipeline::JITCONFIG_ENV;
use crate::domain::{
    CommandSpec, ConfigError, InstanceConfig, ReadinessPolicy, RetryPolicy, RunError, RunnerConfig,
    Substitutions,
};
use crate::output::OutputContext;

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Architecture label used in the instance display name
    #[arg(long, env = "GHA_GPU_RUNNER_ARCH", default_value = DEFAULT_ARCH)]
    pub arch: String,

    /// Availability domain to launch in
    #[arg(
        long,
        env = "GHA_GPU_RUNNER_AVAILABILITY_DOMAIN",
        default_value = DEFAULT_AVAILABILITY_DOMAIN
    )]
    pub availability_domain: String,

    /// Compartment OCID for the instance
    #[arg(long, env = "GHA_GPU_RUNNER_COMPARTMENT_ID", default_value = DEFAULT_COMPARTMENT_ID)]
    pub compartment_id: String,

    /// Subnet OCID; the instance gets a public IP on it
    #[arg(long, env = "GHA_GPU_RUNNER_SUBNET_ID", default_value = DEFAULT_SUBNET_ID)]
    pub subnet_id: String,

    /// Compute shape
    #[arg(long, env = "GHA_GPU_RUNNER_SHAPE", default_value = DEFAULT_SHAPE)]
    pub shape: String,

    /// Boot volume size in GB
    #[arg(
        long = "boot-volume-size-in-gbs",
        env = "GHA_GPU_RUNNER_BOOT_VOLUME_SIZE_IN_GBS",
        default_value_t = DEFAULT_BOOT_VOLUME_SIZE_GBS
    )]
    pub boot_volume_size_gbs: u64,

    /// Image OCID with the runner cache baked in (required)
    #[arg(long, env = "GHA_GPU_RUNNER_IMAGE_ID", default_value = "")]
    pub image_id: String,

    /// Cloud command-line client to invoke
    #[arg(long, env = "GHA_GPU_RUNNER_OCI_CLI", default_value = "oci")]
    pub oci_cli: String,

    /// Delay before the first readiness poll
    #[arg(long, env = "GHA_GPU_RUNNER_GRACE_PERIOD_SECS", default_value_t = 30)]
    pub grace_period_secs: u64,

    /// How long to wait for the instance to report running
    #[arg(long, env = "GHA_GPU_RUNNER_READY_TIMEOUT_SECS", default_value_t = 900)]
    pub ready_timeout_secs: u64,

    /// Interval between readiness polls
    #[arg(long, env = "GHA_GPU_RUNNER_POLL_INTERVAL_SECS", default_value_t = 10)]
    pub poll_interval_secs: u64,

    /// Maximum SSH connection attempts
    #[arg(long, env = "GHA_GPU_RUNNER_CONNECT_ATTEMPTS", default_value_t = 30)]
    pub connect_attempts: u32,

    /// Overall budget for SSH connection attempts
    #[arg(long, env = "GHA_GPU_RUNNER_CONNECT_DEADLINE_SECS", default_value_t = 600)]
    pub connect_deadline_secs: u64,

    /// Pause between SSH connection attempts
    #[arg(long, env = "GHA_GPU_RUNNER_CONNECT_BACKOFF_SECS", default_value_t = 10)]
    pub connect_backoff_secs: u64,

    /// Cancel the whole run after this long; the instance is still deleted
    #[arg(long, env = "GHA_GPU_RUNNER_RUN_TIMEOUT_SECS", default_value_t = 6 * 60 * 60)]
    pub run_timeout_secs: u64,

    /// Debug-level logging (use --debug=false for info)
    #[arg(
        long,
        env = "GHA_GPU_RUNNER_DEBUG",
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_value_t = true,
        default_missing_value = "true"
    )]
    pub debug: bool,

    /// Just-in-time runner configuration for the job
    #[arg(
        long,
        env = "ACTIONS_RUNNER_INPUT_JITCONFIG",
        hide = true,
        hide_env_values = true,
        default_value = ""
    )]
    pub jitconfig: String,
}

/// Build the immutable job configuration from parsed arguments.
#[must_use]
pub fn config_from_args(args: &RunArgs) -> RunnerConfig {
    RunnerConfig {
        instance: InstanceConfig {
            arch: args.arch.clone(),
            availability_domain: args.availability_domain.clone(),
            compartment_id: args.compartment_id.clone(),
            subnet_id: args.subnet_id.clone(),
            shape: args.shape.clone(),
            boot_volume_size_gbs: args.boot_volume_size_gbs,
            image_id: args.image_id.clone(),
        },
        readiness: ReadinessPolicy {
            grace_period: Duration::from_secs(args.grace_period_secs),
            timeout: Duration::from_secs(args.ready_timeout_secs),
            poll_interval: Duration::from_secs(args.poll_interval_secs),
        },
        connect: RetryPolicy {
            max_attempts: args.connect_attempts,
            deadline: Duration::from_secs(args.connect_deadline_secs),
            backoff: Duration::from_secs(args.connect_backoff_secs),
            ..RetryPolicy::default()
        },
        login_user: LOGIN_USER.to_string(),
        ..RunnerConfig::default()
    }
}

/// Entry point for the run command.
///
/// # Errors
///
/// Returns the run's fatal error. A failed cleanup alone is not an error.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<()> {
    if args.run_timeout_secs == 0 {
        return Err(RunError::from(ConfigError::InvalidValue {
            flag: "run-timeout-secs",
            value: "0".to_string(),
            reason: "must be greater than zero",
        })
        .into());
    }
    if args.jitconfig.is_empty() {
        warn!("{JITCONFIG_ENV} is not set; the runner will start without a job configuration");
    }

    let plan = JobPlan {
        config: config_from_args(args),
        commands: CommandSpec::runner_bootstrap(),
        substitutions: Substitutions::jitconfig(args.jitconfig.as_str()),
    };

    let cancel = CancellationToken::new();
    let watchdog = tokio::spawn(cancel_on_shutdown(
        cancel.clone(),
        Duration::from_secs(args.run_timeout_secs),
    ));
    let result = run_job(
        &app.provisioner,
        &app.keys,
        &app.connector,
        &app.reporter(),
        &plan,
        &cancel,
    )
    .await;
    watchdog.abort();

    let report = result?;
    print_report(&app.output, &report);
    Ok(())
}

fn print_report(ctx: &OutputContext, report: &RunReport) {
    ctx.header("Runner job finished");
    ctx.kv("instance", &report.instance_id);
    ctx.kv("commands", &format!("{} succeeded", report.records.len()));
    match &report.cleanup_error {
        None => ctx.success("instance deleted"),
        Some(message) => ctx.warn(&format!("instance may still exist: {message}")),
    }
}

/// Cancel `cancel` on Ctrl-C, SIGTERM, or once `run_timeout` elapses.
async fn cancel_on_shutdown(cancel: CancellationToken, run_timeout: Duration) {
    tokio::select! {
        () = tokio::time::sleep(run_timeout) => {
            warn!(timeout_secs = run_timeout.as_secs(), "run timeout elapsed; cancelling");
        }
        () = ctrl_c() => warn!("interrupt received; cancelling"),
        () = terminate() => warn!("SIGTERM received; cancelling"),
    }
    cancel.cancel();
}

async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            warn!(?err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
