//! Shared fixtures for the PeerFS integration suites.

use peerfs_core::{
    PeerId, SessionConfig, SessionHandle, Subscription, TransportEvent, WireMessage,
};
use peerfs_crypto::{Tag, compress_and_encrypt};
use peerfs_files::{BLOCK_SIZE, BlockLayout, describe};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Upper bound for any single wait in the suites
pub const WAIT: Duration = Duration::from_secs(10);

/// A file staged the way a publisher stages it, split into blocks
pub struct Staged {
    /// Keeps the fixture files alive
    pub dir: TempDir,
    /// Plaintext source file
    pub source: PathBuf,
    /// Plaintext bytes
    pub plain: Vec<u8>,
    /// Tag the blob was encrypted under
    pub tag: Tag,
    /// Encrypted blob, block by block
    pub blocks: Vec<Vec<u8>>,
}

impl Staged {
    /// Number of blocks
    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// Frame carrying block `index`, as a non-finished peer would send it
    pub fn frame(&self, index: u64) -> WireMessage {
        WireMessage::block(
            self.tag,
            index,
            self.blocks[index as usize].clone(),
            self.block_count(),
            false,
        )
    }

    /// Path under the fixture directory
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Seeded pseudo-random bytes; gzip barely shrinks them
pub fn noise(len: usize, seed: u64) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut bytes);
    bytes
}

/// Write `len` noise bytes to a fresh source file
pub async fn source_file(len: usize, seed: u64) -> (TempDir, PathBuf, Vec<u8>) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("source.bin");
    let plain = noise(len, seed);
    tokio::fs::write(&path, &plain).await.unwrap();
    (dir, path, plain)
}

/// Stage `len` noise bytes under a fresh tag
pub async fn stage(len: usize, password: &str) -> Staged {
    let (dir, source, plain) = source_file(len, len as u64).await;
    let staged = dir.path().join("staged.bin");

    let tag = Tag::generate().unwrap();
    compress_and_encrypt(&source, &staged, password, &tag)
        .await
        .unwrap();

    let layout = describe(&staged).await.unwrap();
    let bytes = tokio::fs::read(&staged).await.unwrap();
    let blocks: Vec<Vec<u8>> = bytes.chunks(BLOCK_SIZE).map(<[u8]>::to_vec).collect();
    assert_eq!(blocks.len() as u64, layout.block_count);

    Staged {
        dir,
        source,
        plain,
        tag,
        blocks,
    }
}

/// Session config with a 5 ms pace
pub fn fast_config() -> SessionConfig {
    SessionConfig::default().with_pace_interval(Duration::from_millis(5))
}

/// Next frame on `sub`, skipping link events
pub async fn next_message(sub: &mut Subscription) -> (PeerId, WireMessage) {
    loop {
        let event = tokio::time::timeout(WAIT, sub.events.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("transport closed");
        if let TransportEvent::Message { from, message } = event {
            return (from, message);
        }
    }
}

/// Drop every queued event; true if any of them was a frame
pub fn drain_messages(sub: &mut Subscription) -> bool {
    let mut seen = false;
    while let Ok(event) = sub.events.try_recv() {
        seen |= matches!(event, TransportEvent::Message { .. });
    }
    seen
}

/// Wait for `handle` to finish and compare the restored file with `plain`
pub async fn assert_restored(handle: &SessionHandle, output: &Path, plain: &[u8]) {
    tokio::time::timeout(WAIT, handle.finished())
        .await
        .expect("timed out waiting for the restore")
        .expect("restore failed");
    let restored = tokio::fs::read(output).await.unwrap();
    assert_eq!(restored, plain);
}

/// Layout of a file on disk
pub async fn layout_of(path: &Path) -> BlockLayout {
    describe(path).await.unwrap()
}
