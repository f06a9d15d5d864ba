//! Machine lifecycle state as observed from the compute provider.

use std::fmt;

/// Lifecycle state of a provisioned instance.
///
/// `Requested → Provisioning → Running → Terminating → Terminated`, with
/// `Failed` absorbing anything that can no longer reach `Running` unattended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineState {
    Requested,
    Provisioning,
    Running,
    Terminating,
    Terminated,
    Failed,
}

impl MachineState {
    /// Map a provider lifecycle string onto a machine state.
    ///
    /// Returns `None` for strings this runner does not recognise; callers keep
    /// the previously observed state in that case.
    #[must_use]
    pub fn from_provider(state: &str) -> Option<Self> {
        match state.trim().to_ascii_uppercase().as_str() {
            "PROVISIONING" | "STARTING" | "MOVING" | "CREATING_IMAGE" => Some(Self::Provisioning),
            "RUNNING" => Some(Self::Running),
            "TERMINATING" => Some(Self::Terminating),
            "TERMINATED" => Some(Self::Terminated),
            "STOPPING" | "STOPPED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Whether waiting longer could still yield `Running`.
    #[must_use]
    pub fn can_become_running(self) -> bool {
        matches!(self, Self::Requested | Self::Provisioning | Self::Running)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "REQUESTED",
            Self::Provisioning => "PROVISIONING",
            Self::Running => "RUNNING",
            Self::Terminating => "TERMINATING",
            Self::Terminated => "TERMINATED",
            Self::Failed => "FAILED",
        })
    }
}

/// A single provisioned instance, owned by the runner job for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Machine {
    id: String,
    state: MachineState,
    external_address: String,
}

impl Machine {
    /// A machine whose launch request was just accepted.
    #[must_use]
    pub fn provisioning(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state: MachineState::Provisioning,
            external_address: String::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> MachineState {
        self.state
    }

    /// The public address, empty until one has been looked up.
    #[must_use]
    pub fn external_address(&self) -> &str {
        &self.external_address
    }

    /// Record a freshly observed provider state.
    ///
    /// `Terminated` and `Failed` are absorbing: later observations do not
    /// move the machine out of them.
    pub fn observe(&mut self, state: MachineState) {
        if matches!(self.state, MachineState::Terminated | MachineState::Failed)
            && state != MachineState::Terminated
        {
            return;
        }
        self.state = state;
    }

    pub fn set_external_address(&mut self, address: impl Into<String>) {
        self.external_address = address.into();
    }

    /// The address to dial, available only once the machine is observed
    /// running with a non-empty external address.
    #[must_use]
    pub fn ssh_target(&self) -> Option<&str> {
        (self.state == MachineState::Running && !self.external_address.is_empty())
            .then_some(self.external_address.as_str())
    }
}
