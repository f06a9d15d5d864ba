//! Infrastructure implementation of the `ComputeProvider` port.
//!
//! `OciCliProvisioner<R>` routes every cloud call through the provider's
//! command-line client via a `CommandRunner` and parses its JSON output.
//! Authentication is whatever the client itself is configured with.

use std::process::Output;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{CommandRunner, ComputeProvider, InstanceRecord};
use crate::domain::LaunchSpec;
use crate::infra::command_runner::{DEFAULT_CMD_TIMEOUT, TokioCommandRunner};

/// Infrastructure adapter over the `oci` command-line client.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct OciCliProvisioner<R: CommandRunner> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> OciCliProvisioner<R> {
    pub fn new(runner: R, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    async fn invoke(&self, what: &str, args: &[&str]) -> Result<Output> {
        let mut full = Vec::with_capacity(args.len() + 2);
        full.extend_from_slice(args);
        full.extend_from_slice(&["--output", "json"]);
        let output = self
            .runner
            .run(&self.program, &full)
            .await
            .with_context(|| format!("{} {what}", self.program))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {what} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            );
        }
        Ok(output)
    }
}

impl OciCliProvisioner<TokioCommandRunner> {
    /// Convenience constructor for production use.
    #[must_use]
    pub fn default_runner(program: impl Into<String>) -> Self {
        Self::new(TokioCommandRunner::new(DEFAULT_CMD_TIMEOUT), program)
    }
}

// ── Response envelopes ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct InstanceData {
    id: String,
    lifecycle_state: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VnicData {
    #[serde(default)]
    public_ip: Option<String>,
    #[serde(default)]
    is_primary: Option<bool>,
}

fn parse<T: DeserializeOwned>(what: &str, output: &Output) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(&output.stdout)
        .with_context(|| format!("parsing {what} response"))?;
    Ok(envelope.data)
}

impl From<InstanceData> for InstanceRecord {
    fn from(data: InstanceData) -> Self {
        Self {
            id: data.id,
            lifecycle_state: data.lifecycle_state,
        }
    }
}

/// The primary VNIC's public address, else the first public address found.
fn pick_public_ip(vnics: Vec<VnicData>) -> Option<String> {
    let mut candidates: Vec<(bool, String)> = vnics
        .into_iter()
        .filter_map(|v| {
            let ip = v.public_ip.filter(|ip| !ip.trim().is_empty())?;
            Some((v.is_primary.unwrap_or(false), ip))
        })
        .collect();
    candidates.sort_by_key(|(primary, _)| !primary);
    candidates.into_iter().next().map(|(_, ip)| ip)
}

impl<R: CommandRunner> ComputeProvider for OciCliProvisioner<R> {
    async fn launch(&self, spec: &LaunchSpec) -> Result<InstanceRecord> {
        let metadata: serde_json::Map<String, serde_json::Value> = spec
            .metadata()
            .into_iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::from(v)))
            .collect();
        let metadata = serde_json::Value::Object(metadata).to_string();
        let boot_volume = spec.boot_volume_size_gbs.to_string();
        let assign_public_ip = spec.assign_public_ip.to_string();
        let args: &[&str] = &[
            "compute",
            "instance",
            "launch",
            "--compartment-id",
            &spec.compartment_id,
            "--availability-domain",
            &spec.availability_domain,
            "--shape",
            &spec.shape,
            "--image-id",
            &spec.image_id,
            "--subnet-id",
            &spec.subnet_id,
            "--assign-public-ip",
            &assign_public_ip,
            "--display-name",
            &spec.display_name,
            "--boot-volume-size-in-gbs",
            &boot_volume,
            "--metadata",
            &metadata,
        ];
        let output = self.invoke("compute instance launch", args).await?;
        parse::<InstanceData>("compute instance launch", &output).map(Into::into)
    }

    async fn describe(&self, instance_id: &str) -> Result<InstanceRecord> {
        let output = self
            .invoke(
                "compute instance get",
                &["compute", "instance", "get", "--instance-id", instance_id],
            )
            .await?;
        parse::<InstanceData>("compute instance get", &output).map(Into::into)
    }

    async fn public_address(&self, instance_id: &str) -> Result<Option<String>> {
        let output = self
            .invoke(
                "compute instance list-vnics",
                &["compute", "instance", "list-vnics", "--instance-id", instance_id],
            )
            .await?;
        let vnics: Vec<VnicData> = parse("compute instance list-vnics", &output)?;
        Ok(pick_public_ip(vnics))
    }

    async fn terminate(&self, instance_id: &str) -> Result<()> {
        self.invoke(
            "compute instance terminate",
            &[
                "compute",
                "instance",
                "terminate",
                "--instance-id",
                instance_id,
                "--force",
                "--preserve-boot-volume",
                "false",
            ],
        )
        .await?;
        Ok(())
    }
}
