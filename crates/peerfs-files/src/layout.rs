//! Block layout.

use crate::{BLOCK_SIZE, BlockError, Result};

/// Largest block count whose blob size still fits in a `u64`
pub const MAX_BLOCK_COUNT: u64 = u64::MAX / BLOCK_SIZE as u64;

/// How a blob of a given size splits into blocks.
///
/// `block_count = ceil(size / BLOCK_SIZE)`. The final block holds
/// `size % BLOCK_SIZE` bytes, or a full block when the size is a non-zero
/// exact multiple. An empty blob has no blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockLayout {
    /// Number of blocks
    pub block_count: u64,
    /// Length of the final block in bytes
    pub last_block_size: usize,
}

impl BlockLayout {
    /// Compute the layout of a blob of `size` bytes
    #[must_use]
    pub fn from_size(size: u64) -> Self {
        let block = BLOCK_SIZE as u64;
        let block_count = size.div_ceil(block);
        let rem = (size % block) as usize;
        let last_block_size = if size > 0 && rem == 0 { BLOCK_SIZE } else { rem };
        Self {
            block_count,
            last_block_size,
        }
    }

    /// Total blob size in bytes
    #[must_use]
    pub fn size(&self) -> u64 {
        if self.block_count == 0 {
            return 0;
        }
        (self.block_count - 1) * BLOCK_SIZE as u64 + self.last_block_size as u64
    }

    /// Whether `index` is the final block
    #[must_use]
    pub fn is_last(&self, index: u64) -> bool {
        self.block_count > 0 && index == self.block_count - 1
    }

    /// Whether `index` lies inside the layout
    #[must_use]
    pub fn contains(&self, index: u64) -> bool {
        index < self.block_count
    }

    /// Length of block `index`
    #[must_use]
    pub fn block_len(&self, index: u64) -> usize {
        if self.is_last(index) {
            self.last_block_size
        } else {
            BLOCK_SIZE
        }
    }

    /// Byte offset of block `index`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::OutOfRange`] if the offset does not fit in a
    /// `u64`.
    pub fn offset(index: u64) -> Result<u64> {
        index
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or(BlockError::OutOfRange {
                index,
                block_count: MAX_BLOCK_COUNT,
            })
    }
}
