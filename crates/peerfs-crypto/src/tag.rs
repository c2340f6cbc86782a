//! Content tags.
//!
//! A tag is the only public handle of a published file: spreaders join the
//! swarm with the tag and the password. The same bytes are used as the
//! AES-CTR initialization vector.

use crate::random::random_16;
use crate::{CryptoError, TAG_SIZE};
use std::fmt;
use std::str::FromStr;

/// Random 16-byte content tag, written as lowercase hex on the wire
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag([u8; TAG_SIZE]);

impl Tag {
    /// Generate a fresh random tag.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::RandomFailed`] if the OS CSPRNG fails.
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self(random_16()?))
    }

    /// Create from raw bytes
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TAG_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, rejecting anything that is not exactly one IV long.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidTagLength`] on a length mismatch.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; TAG_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidTagLength {
                    expected: TAG_SIZE,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }

    /// Parse from hex text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not hex or does not decode to 16 bytes.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(text.trim())?;
        Self::from_slice(&bytes)
    }

    /// Lowercase hex representation
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw tag bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; TAG_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", &self.to_hex()[..8])
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Tag {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}
