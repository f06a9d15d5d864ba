//! The immutable launch request for one runner instance.

use chrono::NaiveDateTime;

use crate::domain::config::InstanceConfig;

/// Prefix of every instance display name.
pub const DISPLAY_NAME_PREFIX: &str = "kubeflow-gha-gpu-runner";

/// Boot-metadata key the image reads authorized SSH keys from.
pub const SSH_AUTHORIZED_KEYS: &str = "ssh_authorized_keys";

/// Everything needed to request instance creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub compartment_id: String,
    pub availability_domain: String,
    pub subnet_id: String,
    pub shape: String,
    pub boot_volume_size_gbs: u64,
    pub image_id: String,
    pub display_name: String,
    /// `authorized_keys` line injected through boot metadata.
    pub ssh_authorized_keys: String,
    pub assign_public_ip: bool,
}

impl LaunchSpec {
    /// Builds the spec for `config`, embedding `public_key` and a display
    /// name qualified by `now`.
    #[must_use]
    pub fn new(config: &InstanceConfig, public_key: &str, now: NaiveDateTime) -> Self {
        Self {
            compartment_id: config.compartment_id.clone(),
            availability_domain: config.availability_domain.clone(),
            subnet_id: config.subnet_id.clone(),
            shape: config.shape.clone(),
            boot_volume_size_gbs: config.boot_volume_size_gbs,
            image_id: config.image_id.clone(),
            display_name: display_name(&config.arch, now),
            ssh_authorized_keys: public_key.to_string(),
            assign_public_ip: true,
        }
    }

    /// Boot metadata as key/value pairs.
    #[must_use]
    pub fn metadata(&self) -> [(&'static str, &str); 1] {
        [(SSH_AUTHORIZED_KEYS, self.ssh_authorized_keys.as_str())]
    }
}

/// `kubeflow-gha-gpu-runner-<arch>-<YYYYMMDD-HHMMSS>`
#[must_use]
pub fn display_name(arch: &str, now: NaiveDateTime) -> String {
    format!("{DISPLAY_NAME_PREFIX}-{arch}-{}", now.format("%Y%m%d-%H%M%S"))
}
