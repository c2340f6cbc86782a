//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Tag cannot be used as the cipher IV
    #[error("invalid tag length: expected {expected}, got {actual}")]
    InvalidTagLength {
        /// Expected length (cipher IV size)
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Tag text is not valid hex
    #[error("invalid tag encoding: {0}")]
    InvalidTagEncoding(#[from] hex::FromHexError),

    /// Random number generation failed
    #[error("random number generation failed")]
    RandomFailed,

    /// Reading the codec input failed
    #[error("failed to read codec input: {0}")]
    Read(#[source] std::io::Error),

    /// Writing the codec output failed
    #[error("failed to write codec output: {0}")]
    Write(#[source] std::io::Error),

    /// Compressed stream is corrupt (wrong password, wrong tag or damaged blocks)
    #[error("corrupt compressed stream: {0}")]
    CorruptStream(#[source] std::io::Error),
}
