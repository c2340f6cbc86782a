//! Block store errors.

use thiserror::Error;

/// Block store errors
#[derive(Debug, Error)]
pub enum BlockError {
    /// Underlying file I/O failed
    #[error("block I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Block index outside the file layout
    #[error("block {index} out of range (block count {block_count})")]
    OutOfRange {
        /// Requested index
        index: u64,
        /// Number of blocks in the layout
        block_count: u64,
    },

    /// Payload longer than a block
    #[error("block payload of {len} bytes exceeds block size {max}")]
    Oversized {
        /// Payload length
        len: usize,
        /// Block size
        max: usize,
    },
}
