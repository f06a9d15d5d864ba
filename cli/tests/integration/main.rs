//! Integration tests for gha-gpu-runner
//!
//! These tests spawn the actual binary and test end-to-end behavior.

#![allow(clippy::expect_used, clippy::unwrap_used)]

mod cli_tests;
mod fake_cloud;
