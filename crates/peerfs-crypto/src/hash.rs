//! Password key derivation.
//!
//! The key is a single SHA-256 digest of the password bytes. There is no salt
//! and no iteration count, so two swarms sharing a password share a key; only
//! the tag (used as IV) separates their key streams.

use crate::KEY_SIZE;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key derived from a password
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// Create from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key([REDACTED])")
    }
}

/// Derive the cipher key from a password.
#[must_use]
pub fn derive_key(password: &str) -> Key {
    Key(Sha256::digest(password.as_bytes()).into())
}
