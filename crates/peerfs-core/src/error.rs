//! Error types for swarm sessions
//!
//! Errors are categorized to tell the caller whether waiting for the next
//! pacing round can help.
//!
//! # Error Categories
//!
//! - **Transient**: a later round or announcement may succeed (send failures,
//!   a block that failed to persist)
//! - **Permanent**: the session cannot make progress without intervention
//!   (staging codec failure, invalid configuration)
//!
//! # Example
//!
//! ```no_run
//! use peerfs_core::SessionError;
//!
//! fn report(err: SessionError) {
//!     if err.is_transient() {
//!         println!("Will recover on a later round: {}", err);
//!     } else {
//!         println!("Session failed: {}", err);
//!     }
//! }
//! ```

use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur in session operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Staging codec failed (compress/encrypt or decrypt/decompress)
    #[error("Codec error: {0}")]
    Codec(Cow<'static, str>),

    /// Block store or staging file I/O failed
    #[error("Storage error: {0}")]
    Storage(Cow<'static, str>),

    /// Transport operation failed
    #[error("Transport error: {0}")]
    Transport(Cow<'static, str>),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    /// Invalid state transition
    #[error("Invalid state: {0}")]
    InvalidState(Cow<'static, str>),

    /// Command or status channel closed
    #[error("Channel error: {0}")]
    Channel(Cow<'static, str>),

    /// Session task panicked or was cancelled
    #[error("Task join error: {0}")]
    TaskJoin(Cow<'static, str>),
}

impl SessionError {
    /// Returns true if a later pacing round may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, SessionError::Transport(_) | SessionError::Storage(_))
    }

    /// Returns true if the session cannot recover on its own
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            SessionError::Codec(_)
                | SessionError::InvalidConfig(_)
                | SessionError::InvalidState(_)
        )
    }

    /// Create an invalid state error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_state(context: &'static str) -> Self {
        SessionError::InvalidState(Cow::Borrowed(context))
    }

    /// Create an invalid configuration error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        SessionError::InvalidConfig(Cow::Borrowed(context))
    }

    /// Create a channel error with static context (zero allocation)
    #[must_use]
    pub const fn channel(context: &'static str) -> Self {
        SessionError::Channel(Cow::Borrowed(context))
    }
}

impl From<peerfs_crypto::CryptoError> for SessionError {
    fn from(err: peerfs_crypto::CryptoError) -> Self {
        SessionError::Codec(Cow::Owned(err.to_string()))
    }
}

impl From<peerfs_files::BlockError> for SessionError {
    fn from(err: peerfs_files::BlockError) -> Self {
        SessionError::Storage(Cow::Owned(err.to_string()))
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Storage(Cow::Owned(err.to_string()))
    }
}

impl From<crate::transport::TransportError> for SessionError {
    fn from(err: crate::transport::TransportError) -> Self {
        SessionError::Transport(Cow::Owned(err.to_string()))
    }
}

/// Result type for session operations
pub type Result<T> = std::result::Result<T, SessionError>;
