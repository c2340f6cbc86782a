//! # PeerFS Files
//!
//! Block store for the PeerFS swarm.
//!
//! A staging blob is addressed as a sequence of fixed-size blocks. This crate
//! provides:
//! - Block layout computation ([`BlockLayout`])
//! - Positional block reads and writes ([`describe`], [`read_block`], [`write_block`])
//! - Lazy, single-pass block sequences for pacing rounds ([`BlockSequence`])
//! - Scoped staging files removed on drop ([`StagingFile`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod layout;
pub mod sequence;
pub mod staging;
pub mod store;

pub use error::BlockError;
pub use layout::{BlockLayout, MAX_BLOCK_COUNT};
pub use sequence::{BlockSequence, block_sequence};
pub use staging::StagingFile;
pub use store::{describe, read_block, write_block};

/// Block size in bytes. Every block except the last is exactly this long.
pub const BLOCK_SIZE: usize = 256;

/// Result type for block store operations
pub type Result<T> = std::result::Result<T, BlockError>;
