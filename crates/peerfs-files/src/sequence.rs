//! Lazy block sequences.
//!
//! A pacing round walks a fixed list of block indices, one per tick. The
//! payload of each index is read from disk only when the round reaches it.

use crate::layout::BlockLayout;
use crate::store::read_block;
use crate::Result;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Single-pass sequence of `(index, payload)` pairs over a file
#[derive(Debug)]
pub struct BlockSequence {
    path: PathBuf,
    layout: BlockLayout,
    pending: VecDeque<u64>,
}

/// Build a sequence over `indices` of the file at `path`.
///
/// The index list is captured now; the file is only read as the sequence is
/// advanced.
pub fn block_sequence(
    path: &Path,
    layout: BlockLayout,
    indices: impl IntoIterator<Item = u64>,
) -> BlockSequence {
    BlockSequence {
        path: path.to_path_buf(),
        layout,
        pending: indices.into_iter().collect(),
    }
}

impl BlockSequence {
    /// Read the next block, or `None` once every index has been yielded.
    ///
    /// # Errors
    ///
    /// Returns the read error for this index. The index is consumed either
    /// way, so the next call moves on.
    pub async fn next(&mut self) -> Option<Result<(u64, Vec<u8>)>> {
        let index = self.pending.pop_front()?;
        Some(
            read_block(&self.path, index, &self.layout)
                .await
                .map(|bytes| (index, bytes)),
        )
    }

    /// Whether every index has been yielded
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.pending.is_empty()
    }

    /// Indices not yet yielded
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::describe;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_sequence_yields_in_order() {
        let file = NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..600).map(|i| (i % 199) as u8).collect();
        tokio::fs::write(file.path(), &data).await.unwrap();
        let layout = describe(file.path()).await.unwrap();

        let mut seq = block_sequence(file.path(), layout, 0..layout.block_count);
        assert_eq!(seq.remaining(), 3);

        let mut seen = Vec::new();
        while let Some(item) = seq.next().await {
            let (index, bytes) = item.unwrap();
            assert_eq!(bytes.len(), layout.block_len(index));
            seen.push(index);
        }
        assert_eq!(seen, vec![0, 1, 2]);
        assert!(seq.is_exhausted());
        assert!(seq.next().await.is_none());
    }

    #[tokio::test]
    async fn test_sequence_is_lazy() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), vec![1u8; 512]).await.unwrap();
        let layout = describe(file.path()).await.unwrap();

        let mut seq = block_sequence(file.path(), layout, [1, 0]);
        // Changing the file after creation is visible to later reads.
        tokio::fs::write(file.path(), vec![2u8; 512]).await.unwrap();

        let (index, bytes) = seq.next().await.unwrap().unwrap();
        assert_eq!(index, 1);
        assert!(bytes.iter().all(|&b| b == 2));
    }

    #[tokio::test]
    async fn test_sequence_error_consumes_index() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), vec![0u8; 256]).await.unwrap();
        let layout = describe(file.path()).await.unwrap();

        let mut seq = block_sequence(file.path(), layout, [5, 0]);
        assert!(seq.next().await.unwrap().is_err());
        assert_eq!(seq.next().await.unwrap().unwrap().0, 0);
    }
}
