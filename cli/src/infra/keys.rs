//! Infrastructure implementation of the `KeyProvider` port.

use anyhow::{Context, Result};
use ed25519_dalek::SigningKey;
use rand::RngCore;
use rand::rngs::OsRng;

use crate::application::ports::KeyProvider;
use crate::domain::KeyPair;

/// Comment appended to every generated public key.
pub const KEY_COMMENT: &str = "gha-gpu-runner";

/// Generates a fresh Ed25519 key pair from the OS CSPRNG on every call.
///
/// Nothing is written to disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519KeyProvider;

impl KeyProvider for Ed25519KeyProvider {
    fn generate(&self) -> Result<KeyPair> {
        let mut seed = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut seed)
            .context("reading the system random source")?;
        let signing_key = SigningKey::from_bytes(&seed);
        seed.fill(0);
        KeyPair::from_signing_key(signing_key, KEY_COMMENT)
    }
}
