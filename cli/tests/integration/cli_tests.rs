//! Argument parsing and configuration validation through the binary.

use assert_cmd::Command;
use predicates::prelude::*;

pub const IMAGE_ID: &str = "ocid1.image.oc1.iad.aaaaaaaarunnerimage";

/// The binary with a clean environment and no cloud client chosen.
pub fn binary() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("gha-gpu-runner"));
    cmd.env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("ACTIONS_RUNNER_INPUT_JITCONFIG")
        .env_remove("GHA_GPU_RUNNER_IMAGE_ID");
    cmd
}

fn without_image() -> Command {
    let mut cmd = binary();
    cmd.arg("--oci-cli").arg("/nonexistent/oci");
    cmd
}

fn runner() -> Command {
    let mut cmd = without_image();
    cmd.args(["--image-id", IMAGE_ID]);
    cmd
}

#[test]
fn test_help_lists_instance_flags() {
    runner()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--image-id"))
        .stdout(predicate::str::contains("--boot-volume-size-in-gbs"))
        .stdout(predicate::str::contains("--connect-attempts"))
        .stdout(predicate::str::contains("--debug"));
}

#[test]
fn test_help_hides_job_token() {
    runner()
        .env("ACTIONS_RUNNER_INPUT_JITCONFIG", "super-secret-token")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret-token").not())
        .stdout(predicate::str::contains("--jitconfig").not());
}

#[test]
fn test_version_flag_shows_name() {
    runner()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gha-gpu-runner"));
}

#[test]
fn test_omitted_image_id_exits_one_before_any_cloud_call() {
    // The cloud client path does not exist, so reaching launch would fail
    // with a different message.
    without_image()
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: must provide --image-id for the instance",
        ));
}

#[test]
fn test_empty_image_id_exits_one_before_any_cloud_call() {
    without_image()
        .args(["--image-id", ""])
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Error: must provide --image-id for the instance",
        ));
}

#[test]
fn test_malformed_compartment_is_rejected() {
    runner()
        .args(["--compartment-id", "my-compartment"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid value for --compartment-id"));
}

#[test]
fn test_small_boot_volume_is_rejected() {
    runner()
        .args(["--boot-volume-size-in-gbs", "10"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--boot-volume-size-in-gbs"));
}

#[test]
fn test_zero_run_timeout_is_rejected() {
    runner()
        .args(["--run-timeout-secs", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--run-timeout-secs"));
}

#[test]
fn test_flags_read_from_environment() {
    without_image()
        .env("GHA_GPU_RUNNER_IMAGE_ID", "not-an-ocid")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("invalid value for --image-id"));
}

#[test]
fn test_debug_requires_equals_for_value() {
    runner()
        .args(["--debug", "false"])
        .assert()
        .code(2);
}
