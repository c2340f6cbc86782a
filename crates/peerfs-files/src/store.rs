//! Positional block I/O.
//!
//! Every call opens the file, seeks and does one read or write. Sessions
//! touch at most one block per pacing tick, so there is no handle caching.

use crate::layout::BlockLayout;
use crate::{BLOCK_SIZE, BlockError, Result};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::trace;

/// Compute the block layout of the file at `path`.
///
/// # Errors
///
/// Returns [`BlockError::Io`] if the file metadata cannot be read.
pub async fn describe(path: &Path) -> Result<BlockLayout> {
    let meta = tokio::fs::metadata(path).await?;
    Ok(BlockLayout::from_size(meta.len()))
}

/// Read block `index` of the file at `path`.
///
/// The final block is returned at its true length, never padded.
///
/// # Errors
///
/// Returns [`BlockError::OutOfRange`] for an index outside `layout`, and
/// [`BlockError::Io`] if the file is shorter than the layout claims.
pub async fn read_block(path: &Path, index: u64, layout: &BlockLayout) -> Result<Vec<u8>> {
    if !layout.contains(index) {
        return Err(BlockError::OutOfRange {
            index,
            block_count: layout.block_count,
        });
    }

    let mut file = File::open(path).await?;
    let offset = BlockLayout::offset(index)?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = vec![0u8; layout.block_len(index)];
    file.read_exact(&mut buf).await?;

    trace!(index, len = buf.len(), "Read block");
    Ok(buf)
}

/// Write `bytes` as block `index` of the file at `path`.
///
/// The file is created if missing and never truncated; blocks may arrive in
/// any order and leave holes until their neighbours are written.
///
/// # Errors
///
/// Returns [`BlockError::Oversized`] for a payload longer than a block,
/// [`BlockError::OutOfRange`] for an index whose offset overflows, and
/// [`BlockError::Io`] on any file error.
pub async fn write_block(path: &Path, index: u64, bytes: &[u8]) -> Result<()> {
    if bytes.len() > BLOCK_SIZE {
        return Err(BlockError::Oversized {
            len: bytes.len(),
            max: BLOCK_SIZE,
        });
    }

    let offset = BlockLayout::offset(index)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .await?;
    file.seek(SeekFrom::Start(offset)).await?;
    file.write_all(bytes).await?;
    file.flush().await?;

    trace!(index, len = bytes.len(), "Wrote block");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[tokio::test]
    async fn test_describe() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), pattern(700)).await.unwrap();

        let layout = describe(file.path()).await.unwrap();
        assert_eq!(layout.block_count, 3);
        assert_eq!(layout.last_block_size, 188);
    }

    #[tokio::test]
    async fn test_read_blocks() {
        let file = NamedTempFile::new().unwrap();
        let data = pattern(700);
        tokio::fs::write(file.path(), &data).await.unwrap();
        let layout = describe(file.path()).await.unwrap();

        let first = read_block(file.path(), 0, &layout).await.unwrap();
        assert_eq!(first, &data[..256]);

        let last = read_block(file.path(), 2, &layout).await.unwrap();
        assert_eq!(last, &data[512..]);
    }

    #[tokio::test]
    async fn test_read_out_of_range() {
        let file = NamedTempFile::new().unwrap();
        tokio::fs::write(file.path(), pattern(10)).await.unwrap();
        let layout = describe(file.path()).await.unwrap();

        let err = read_block(file.path(), 1, &layout).await.unwrap_err();
        assert!(matches!(
            err,
            BlockError::OutOfRange {
                index: 1,
                block_count: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_write_out_of_order_reassembles() {
        let file = NamedTempFile::new().unwrap();
        let data = pattern(600);

        write_block(file.path(), 2, &data[512..]).await.unwrap();
        write_block(file.path(), 0, &data[..256]).await.unwrap();
        write_block(file.path(), 1, &data[256..512]).await.unwrap();

        let written = tokio::fs::read(file.path()).await.unwrap();
        assert_eq!(written, data);
    }

    #[tokio::test]
    async fn test_rewrite_is_idempotent() {
        let file = NamedTempFile::new().unwrap();
        let data = pattern(300);

        write_block(file.path(), 0, &data[..256]).await.unwrap();
        write_block(file.path(), 1, &data[256..]).await.unwrap();
        write_block(file.path(), 0, &data[..256]).await.unwrap();

        assert_eq!(tokio::fs::read(file.path()).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_write_oversized() {
        let file = NamedTempFile::new().unwrap();
        let err = write_block(file.path(), 0, &pattern(BLOCK_SIZE + 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BlockError::Oversized { len: 257, .. }));
    }

    #[tokio::test]
    async fn test_write_with_overflowing_offset_fails() {
        let file = NamedTempFile::new().unwrap();
        let err = write_block(file.path(), 1 << 56, b"abc").await.unwrap_err();
        assert!(matches!(err, BlockError::OutOfRange { index, .. } if index == 1 << 56));
        assert_eq!(tokio::fs::metadata(file.path()).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_write_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("blob");
        let err = write_block(&path, 0, b"abc").await.unwrap_err();
        assert!(matches!(err, BlockError::Io(_)));
    }
}
