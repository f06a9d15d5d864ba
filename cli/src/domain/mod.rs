//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod launch;
pub mod machine;
pub mod pipeline;
pub mod ssh;

pub use config::{InstanceConfig, ReadinessPolicy, RetryPolicy, RunnerConfig};
pub use error::{ConfigError, RunError, Stage};
pub use launch::LaunchSpec;
pub use machine::{Machine, MachineState};
pub use pipeline::{CommandSpec, ExecutionRecord, Substitutions};
pub use ssh::KeyPair;
