//! Full runs of the binary against a scripted stand-in for the cloud client.
//!
//! The script logs every invocation, so the tests can count delete requests.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use predicates::prelude::*;
use tempfile::TempDir;

use assert_cmd::Command;

use crate::cli_tests::{IMAGE_ID, binary};

const FAKE_OCI: &str = r#"#!/bin/sh
echo "$*" >> "$FAKE_OCI_LOG"
if [ "$3" = "$FAKE_OCI_FAIL" ]; then
  echo "ServiceError: $3 rejected" >&2
  exit 1
fi
case "$3" in
  launch) echo '{"data":{"id":"ocid1.instance.oc1.iad.fake","lifecycle-state":"PROVISIONING"}}' ;;
  get) echo "{\"data\":{\"id\":\"ocid1.instance.oc1.iad.fake\",\"lifecycle-state\":\"$FAKE_OCI_STATE\"}}" ;;
  list-vnics) echo '{"data":[{"is-primary":true}]}' ;;
  terminate) ;;
esac
"#;

struct FakeCloud {
    dir: TempDir,
}

impl FakeCloud {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = dir.path().join("oci");
        std::fs::write(&script, FAKE_OCI).expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod script");
        Self { dir }
    }

    fn script(&self) -> PathBuf {
        self.dir.path().join("oci")
    }

    fn log(&self) -> PathBuf {
        self.dir.path().join("calls.log")
    }

    fn calls(&self) -> Vec<String> {
        read_lines(&self.log())
    }

    fn command(&self, state: &str, fail: &str) -> Command {
        let mut cmd = binary();
        cmd.env("FAKE_OCI_LOG", self.log())
            .env("FAKE_OCI_STATE", state)
            .env("FAKE_OCI_FAIL", fail)
            .env("ACTIONS_RUNNER_INPUT_JITCONFIG", "jit-token")
            .arg("--oci-cli")
            .arg(self.script())
            .args(["--grace-period-secs", "0", "--poll-interval-secs", "1"])
            .args(["--ready-timeout-secs", "5", "--debug=false"]);
        cmd
    }

    fn run(&self, state: &str, fail: &str) -> assert_cmd::assert::Assert {
        self.command(state, fail).args(["--image-id", IMAGE_ID]).assert()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(String::from)
        .collect()
}

fn count(calls: &[String], verb: &str) -> usize {
    calls
        .iter()
        .filter(|c| c.starts_with(&format!("compute instance {verb} ")))
        .count()
}

#[test]
fn test_missing_address_deletes_instance_once() {
    let cloud = FakeCloud::new();
    cloud
        .run("RUNNING", "none")
        .code(1)
        .stderr(predicate::str::contains("cannot find ip for instance"));

    let calls = cloud.calls();
    assert_eq!(count(&calls, "launch"), 1, "{calls:?}");
    assert_eq!(count(&calls, "list-vnics"), 1, "{calls:?}");
    assert_eq!(count(&calls, "terminate"), 1, "{calls:?}");
    let terminate = calls.iter().find(|c| c.contains("terminate")).expect("terminate call");
    assert!(terminate.contains("--preserve-boot-volume false"), "{terminate}");
}

#[test]
fn test_rejected_launch_deletes_nothing() {
    let cloud = FakeCloud::new();
    cloud
        .run("RUNNING", "launch")
        .code(1)
        .stderr(predicate::str::contains("failed to create machine"))
        .stderr(predicate::str::contains("launch rejected"));

    let calls = cloud.calls();
    assert_eq!(count(&calls, "launch"), 1, "{calls:?}");
    assert_eq!(count(&calls, "terminate"), 0, "{calls:?}");
}

#[test]
fn test_missing_image_id_never_reaches_the_cloud() {
    let cloud = FakeCloud::new();
    cloud
        .command("RUNNING", "none")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("must provide --image-id"));

    let calls = cloud.calls();
    assert_eq!(count(&calls, "launch"), 0, "{calls:?}");
    assert!(calls.is_empty(), "{calls:?}");
}

#[test]
fn test_terminated_instance_is_still_deleted_once() {
    let cloud = FakeCloud::new();
    cloud
        .run("TERMINATED", "none")
        .code(1)
        .stderr(predicate::str::contains("entered state TERMINATED"));

    assert_eq!(count(&cloud.calls(), "terminate"), 1);
}

#[test]
fn test_failed_delete_does_not_mask_run_error() {
    let cloud = FakeCloud::new();
    cloud
        .run("RUNNING", "terminate")
        .code(1)
        .stderr(predicate::str::contains("Error: cannot find ip for instance"))
        .stdout(predicate::str::contains("failed to delete machine"));

    assert_eq!(count(&cloud.calls(), "terminate"), 1);
}

#[test]
fn test_launch_carries_public_key_metadata() {
    let cloud = FakeCloud::new();
    cloud.run("RUNNING", "none").code(1);

    let calls = cloud.calls();
    let launch = calls.iter().find(|c| c.contains("instance launch")).expect("launch call");
    assert!(launch.contains("ssh_authorized_keys"), "{launch}");
    assert!(launch.contains("ssh-ed25519 "), "{launch}");
    assert!(!launch.contains("jit-token"), "{launch}");
}
