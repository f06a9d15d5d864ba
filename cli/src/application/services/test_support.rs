//! Shared stubs for service-level tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use ed25519_dalek::SigningKey;

use crate::application::ports::{
    CommandOutput, ComputeProvider, InstanceRecord, RemoteConnector, RemoteSession,
};
use crate::domain::{InstanceConfig, KeyPair, LaunchSpec, Machine, MachineState};

pub const ADDRESS: &str = "203.0.113.9";

pub fn launch_spec() -> LaunchSpec {
    let now = NaiveDate::from_ymd_opt(2024, 5, 1)
        .and_then(|d| d.and_hms_opt(12, 0, 0))
        .expect("valid timestamp");
    LaunchSpec::new(&InstanceConfig::default(), "ssh-ed25519 AAAA test", now)
}

pub fn key_pair() -> KeyPair {
    KeyPair::from_signing_key(SigningKey::from_bytes(&[7u8; 32]), "test").expect("key pair")
}

pub fn running_machine() -> Machine {
    let mut machine = Machine::provisioning(ComputeStub::INSTANCE_ID);
    machine.observe(MachineState::Running);
    machine.set_external_address(ADDRESS);
    machine
}

// ── ComputeStub ───────────────────────────────────────────────────────────────

/// Scripted compute provider. Describe calls consume `states` in order and
/// keep returning the last one; a `"!error"` entry fails that call.
pub struct ComputeStub {
    launch_id: String,
    fail_launch: bool,
    states: RefCell<VecDeque<String>>,
    describe_delay: Duration,
    address: Option<String>,
    fail_terminate: bool,
    describe_calls: Cell<u32>,
    terminate_calls: Cell<u32>,
}

impl ComputeStub {
    pub const INSTANCE_ID: &'static str = "ocid1.instance.oc1.iad.test";

    pub fn new() -> Self {
        Self {
            launch_id: Self::INSTANCE_ID.to_string(),
            fail_launch: false,
            states: RefCell::new(VecDeque::from(["RUNNING".to_string()])),
            describe_delay: Duration::ZERO,
            address: Some(ADDRESS.to_string()),
            fail_terminate: false,
            describe_calls: Cell::new(0),
            terminate_calls: Cell::new(0),
        }
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn with_launch_id(mut self, id: &str) -> Self {
        self.launch_id = id.to_string();
        self
    }

    pub fn with_states(self, states: &[&str]) -> Self {
        *self.states.borrow_mut() = states.iter().map(ToString::to_string).collect();
        self
    }

    /// Every describe call takes `delay` before answering.
    pub fn with_describe_delay(mut self, delay: Duration) -> Self {
        self.describe_delay = delay;
        self
    }

    pub fn with_address(mut self, address: Option<&str>) -> Self {
        self.address = address.map(ToString::to_string);
        self
    }

    pub fn failing_terminate(mut self) -> Self {
        self.fail_terminate = true;
        self
    }

    pub fn describe_calls(&self) -> u32 {
        self.describe_calls.get()
    }

    pub fn terminate_calls(&self) -> u32 {
        self.terminate_calls.get()
    }
}

impl ComputeProvider for ComputeStub {
    async fn launch(&self, _spec: &LaunchSpec) -> Result<InstanceRecord> {
        if self.fail_launch {
            return Err(anyhow!("LimitExceeded: out of host capacity"));
        }
        Ok(InstanceRecord {
            id: self.launch_id.clone(),
            lifecycle_state: "PROVISIONING".to_string(),
        })
    }

    async fn describe(&self, instance_id: &str) -> Result<InstanceRecord> {
        self.describe_calls.set(self.describe_calls.get() + 1);
        if !self.describe_delay.is_zero() {
            tokio::time::sleep(self.describe_delay).await;
        }
        let mut states = self.states.borrow_mut();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or_default()
        } else {
            states.front().cloned().unwrap_or_default()
        };
        if state == "!error" {
            return Err(anyhow!("ServiceUnavailable"));
        }
        Ok(InstanceRecord {
            id: instance_id.to_string(),
            lifecycle_state: state,
        })
    }

    async fn public_address(&self, _instance_id: &str) -> Result<Option<String>> {
        Ok(self.address.clone())
    }

    async fn terminate(&self, _instance_id: &str) -> Result<()> {
        self.terminate_calls.set(self.terminate_calls.get() + 1);
        if self.fail_terminate {
            return Err(anyhow!("NotAuthorizedOrNotFound"));
        }
        Ok(())
    }
}

// ── Remote stubs ──────────────────────────────────────────────────────────────

/// Connector that refuses the first `fail_first` attempts, or hangs forever.
pub struct ConnectorStub {
    fail_first: u32,
    hang: bool,
    attempts: Cell<u32>,
    addresses: RefCell<Vec<String>>,
}

impl ConnectorStub {
    pub fn failing_first(fail_first: u32) -> Self {
        Self {
            fail_first,
            hang: false,
            attempts: Cell::new(0),
            addresses: RefCell::new(Vec::new()),
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Self::failing_first(0)
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.get()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.addresses.borrow().clone()
    }
}

impl RemoteConnector for ConnectorStub {
    type Session = SessionStub;

    async fn connect(&self, address: &str, _key: &KeyPair) -> Result<SessionStub> {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        self.addresses.borrow_mut().push(address.to_string());
        if self.hang {
            std::future::pending::<()>().await;
        }
        if attempt <= self.fail_first {
            return Err(anyhow!("connection refused"));
        }
        Ok(SessionStub::succeeding())
    }
}

/// Session replaying a script of results, then succeeding.
#[derive(Debug)]
pub struct SessionStub {
    script: VecDeque<Result<CommandOutput>>,
    fail_at: Option<(usize, u32)>,
    issued: Vec<String>,
}

impl SessionStub {
    pub fn succeeding() -> Self {
        Self::scripted(Vec::new())
    }

    pub fn scripted(script: Vec<Result<CommandOutput>>) -> Self {
        Self {
            script: script.into(),
            fail_at: None,
            issued: Vec::new(),
        }
    }

    /// Exits with `code` on the command at `index`.
    pub fn failing_at(index: usize, code: u32) -> Self {
        Self {
            fail_at: Some((index, code)),
            ..Self::succeeding()
        }
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.clone()
    }
}

impl RemoteSession for SessionStub {
    async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let index = self.issued.len();
        self.issued.push(command.to_string());
        if let Some(result) = self.script.pop_front() {
            return result;
        }
        let exit_status = match self.fail_at {
            Some((at, code)) if at == index => code,
            _ => 0,
        };
        Ok(CommandOutput {
            exit_status: Some(exit_status),
            output: format!("{command}: done\n").into_bytes(),
        })
    }

    async fn close(self) -> Result<()> {
        Ok(())
    }
}
