//! Domain types and validators for the runner configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access. The value is
//! built once from command-line flags and passed explicitly from there on.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::domain::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_ARCH: &str = "x86";
pub const DEFAULT_AVAILABILITY_DOMAIN: &str = "tdbQ:US-ASHBURN-AD-1";
pub const DEFAULT_COMPARTMENT_ID: &str =
    "ocid1.compartment.oc1..aaaaaaaaczejzfg7ixiqrl7r4jr5dohrtxfpuhdinrq4okj67hskmhgglyfq";
pub const DEFAULT_SUBNET_ID: &str =
    "ocid1.subnet.oc1.iad.aaaaaaaaff7mqwjlremjpiq72i2wjgfjfjz2dhymvtdybhu5mdaikovb67ka";
pub const DEFAULT_SHAPE: &str = "VM.GPU.A10.1";
pub const DEFAULT_BOOT_VOLUME_SIZE_GBS: u64 = 400;

/// Account the image's boot process authorizes the injected key for.
pub const LOGIN_USER: &str = "ubuntu";

/// Smallest boot volume the provider accepts.
pub const MIN_BOOT_VOLUME_SIZE_GBS: u64 = 50;

#[allow(clippy::expect_used)] // Pattern is a compile-time constant
static OCID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ocid1\.[a-z0-9]+\.[a-z0-9]+\.[a-z0-9-]*(\.[a-z0-9-]*)?\.[a-z0-9]+$")
        .expect("valid OCID pattern")
});

// ── Config schema ────────────────────────────────────────────────────────────

/// What to launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub arch: String,
    pub availability_domain: String,
    pub compartment_id: String,
    pub subnet_id: String,
    pub shape: String,
    pub boot_volume_size_gbs: u64,
    /// Required; there is no usable default image.
    pub image_id: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            arch: DEFAULT_ARCH.to_string(),
            availability_domain: DEFAULT_AVAILABILITY_DOMAIN.to_string(),
            compartment_id: DEFAULT_COMPARTMENT_ID.to_string(),
            subnet_id: DEFAULT_SUBNET_ID.to_string(),
            shape: DEFAULT_SHAPE.to_string(),
            boot_volume_size_gbs: DEFAULT_BOOT_VOLUME_SIZE_GBS,
            image_id: String::new(),
        }
    }
}

/// How long to wait for the provider to report the instance running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Fixed delay before the first poll.
    pub grace_period: Duration,
    /// Overall budget for polling, measured after the grace period.
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(30),
            timeout: Duration::from_secs(15 * 60),
            poll_interval: Duration::from_secs(10),
        }
    }
}

/// Bounds on dialing the instance's SSH daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// No attempt starts, and no attempt runs, past this budget.
    pub deadline: Duration,
    pub backoff: Duration,
    /// Upper bound on a single dial-and-authenticate attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            deadline: Duration::from_secs(10 * 60),
            backoff: Duration::from_secs(10),
            attempt_timeout: Duration::from_secs(10),
        }
    }
}

/// The complete, immutable configuration of one runner job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    pub instance: InstanceConfig,
    pub readiness: ReadinessPolicy,
    pub connect: RetryPolicy,
    pub login_user: String,
    /// Bound on the delete request issued during cleanup.
    pub cleanup_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            instance: InstanceConfig::default(),
            readiness: ReadinessPolicy::default(),
            connect: RetryPolicy::default(),
            login_user: LOGIN_USER.to_string(),
            cleanup_timeout: Duration::from_secs(120),
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

impl RunnerConfig {
    /// Checks every required field before anything touches the network.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found, image identifier first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let instance = &self.instance;
        require_ocid("image-id", &instance.image_id)?;
        require_ocid("compartment-id", &instance.compartment_id)?;
        require_ocid("subnet-id", &instance.subnet_id)?;
        require("availability-domain", &instance.availability_domain)?;
        require("shape", &instance.shape)?;
        require("arch", &instance.arch)?;

        if instance.boot_volume_size_gbs < MIN_BOOT_VOLUME_SIZE_GBS {
            return Err(ConfigError::InvalidValue {
                flag: "boot-volume-size-in-gbs",
                value: instance.boot_volume_size_gbs.to_string(),
                reason: "must be at least 50",
            });
        }
        if self.readiness.timeout.is_zero() {
            return Err(zero("ready-timeout-secs"));
        }
        if self.readiness.poll_interval.is_zero() {
            return Err(zero("poll-interval-secs"));
        }
        if self.connect.max_attempts == 0 {
            return Err(zero("connect-attempts"));
        }
        if self.connect.deadline.is_zero() {
            return Err(zero("connect-deadline-secs"));
        }
        require("login-user", &self.login_user)?;
        Ok(())
    }
}

fn require(flag: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { flag });
    }
    Ok(())
}

fn require_ocid(flag: &'static str, value: &str) -> Result<(), ConfigError> {
    require(flag, value)?;
    if !OCID.is_match(value) {
        return Err(ConfigError::InvalidValue {
            flag,
            value: value.to_string(),
            reason: "expected an OCID such as ocid1.<type>.<realm>.<region>.<id>",
        });
    }
    Ok(())
}

fn zero(flag: &'static str) -> ConfigError {
    ConfigError::InvalidValue {
        flag,
        value: "0".to_string(),
        reason: "must be greater than zero",
    }
}
