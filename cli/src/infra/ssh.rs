//! Infrastructure implementation of the remote execution ports over SSH.
//!
//! `RusshConnector` dials port 22 and authenticates with the run's in-memory
//! Ed25519 key. No key material or host identity is written to disk.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::{ChannelMsg, Disconnect};
use russh_keys::key;
use tracing::debug;

use crate::application::ports::{CommandOutput, RemoteConnector, RemoteSession};
use crate::domain::KeyPair;

/// SSH port on the runner image.
pub const SSH_PORT: u16 = 22;

/// Bound on the TCP dial plus handshake of one attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client handler that accepts any host key.
///
/// The instance is created seconds earlier by this process and its host key
/// is not known in advance, so the first key presented is trusted
/// (trust-on-first-use). The key is not pinned anywhere.
struct TrustOnFirstUse;

#[async_trait]
impl client::Handler for TrustOnFirstUse {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &key::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(fingerprint = %server_public_key.fingerprint(), "accepting host key");
        Ok(true)
    }
}

/// Opens public-key authenticated sessions as a fixed login user.
pub struct RusshConnector {
    user: String,
    connect_timeout: Duration,
}

impl RusshConnector {
    #[must_use]
    pub fn new(user: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            user: user.into(),
            connect_timeout,
        }
    }
}

impl RemoteConnector for RusshConnector {
    type Session = RusshSession;

    async fn connect(&self, address: &str, key: &KeyPair) -> Result<RusshSession> {
        let config = Arc::new(client::Config::default());
        let mut handle = tokio::time::timeout(
            self.connect_timeout,
            client::connect(config, (address, SSH_PORT), TrustOnFirstUse),
        )
        .await
        .with_context(|| {
            format!(
                "dialing {address}:{SSH_PORT} timed out after {}s",
                self.connect_timeout.as_secs()
            )
        })?
        .with_context(|| format!("dialing {address}:{SSH_PORT}"))?;

        let auth = Arc::new(key::KeyPair::Ed25519(key.signing_key().clone()));
        let accepted = handle
            .authenticate_publickey(self.user.as_str(), auth)
            .await
            .context("public key authentication")?;
        anyhow::ensure!(
            accepted,
            "server rejected public key for user {:?}",
            self.user
        );
        Ok(RusshSession { handle })
    }
}

/// One authenticated connection. Each command gets its own channel.
pub struct RusshSession {
    handle: Handle<TrustOnFirstUse>,
}

impl RemoteSession for RusshSession {
    async fn run(&mut self, command: &str) -> Result<CommandOutput> {
        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .context("opening session channel")?;
        channel
            .exec(true, command)
            .await
            .context("starting remote command")?;

        let mut result = CommandOutput::default();
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } | ChannelMsg::ExtendedData { ref data, .. } => {
                    result.output.extend_from_slice(&data[..]);
                }
                ChannelMsg::ExitStatus { exit_status } => result.exit_status = Some(exit_status),
                _ => {}
            }
        }
        Ok(result)
    }

    async fn close(self) -> Result<()> {
        self.handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await
            .context("closing ssh session")
    }
}
