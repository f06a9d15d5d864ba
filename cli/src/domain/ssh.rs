//! Ephemeral SSH key material and OpenSSH public-key encoding.

use std::fmt;

use anyhow::Result;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use ed25519_dalek::{SigningKey, VerifyingKey};

const ED25519_ALGORITHM: &str = "ssh-ed25519";

/// Encodes `key` as an OpenSSH `authorized_keys` line.
///
/// The blob is the SSH wire encoding: a length-prefixed algorithm name
/// followed by the length-prefixed 32-byte public point.
#[must_use]
pub fn encode_ed25519_public_key(key: &VerifyingKey, comment: &str) -> String {
    let point = key.as_bytes();
    let mut blob = Vec::with_capacity(4 + ED25519_ALGORITHM.len() + 4 + point.len());
    put_string(&mut blob, ED25519_ALGORITHM.as_bytes());
    put_string(&mut blob, point);
    let encoded = STANDARD.encode(blob);
    if comment.is_empty() {
        format!("{ED25519_ALGORITHM} {encoded}")
    } else {
        format!("{ED25519_ALGORITHM} {encoded} {comment}")
    }
}

fn put_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    #[allow(clippy::cast_possible_truncation)] // Both fields are a few dozen bytes
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

/// Validates that `key` is an ed25519 public key with non-empty key material.
///
/// Accepts the `authorized_keys` format: `ssh-ed25519 <base64-material> [comment]`.
///
/// # Errors
///
/// Returns an error if the key does not start with `ssh-ed25519 ` or has no
/// key material after the prefix.
pub fn validate_public_key(key: &str) -> Result<()> {
    let material = key
        .strip_prefix("ssh-ed25519 ")
        .ok_or_else(|| anyhow::anyhow!("public key must be an ed25519 key (got: {key:?})"))?;
    anyhow::ensure!(!material.trim().is_empty(), "public key has no key material");
    anyhow::ensure!(
        !key.contains('\n'),
        "public key must be a single authorized_keys line"
    );
    Ok(())
}

/// An ephemeral key pair for one run.
///
/// The private half lives only in this value and is zeroed when it is
/// dropped. `Debug` never prints it.
pub struct KeyPair {
    public_key: String,
    signing_key: SigningKey,
}

impl KeyPair {
    /// Wraps a signing key, deriving its `authorized_keys` line.
    ///
    /// # Errors
    ///
    /// Returns an error if the derived public key is malformed.
    pub fn from_signing_key(signing_key: SigningKey, comment: &str) -> Result<Self> {
        let public_key = encode_ed25519_public_key(&signing_key.verifying_key(), comment);
        validate_public_key(&public_key)?;
        Ok(Self {
            public_key,
            signing_key,
        })
    }

    /// The `authorized_keys` line injected into the instance's boot metadata.
    #[must_use]
    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// The private half, for building the SSH authentication handle.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}
