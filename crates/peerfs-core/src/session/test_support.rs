//! Fixtures shared by the role tests.

use crate::config::SessionConfig;
use crate::peer::PeerId;
use crate::transport::{Subscription, TransportEvent};
use crate::wire::WireMessage;
use peerfs_crypto::{Tag, compress_and_encrypt};
use peerfs_files::{BLOCK_SIZE, BlockLayout};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

pub(crate) struct Staged {
    pub dir: TempDir,
    pub source: PathBuf,
    pub plain: Vec<u8>,
    pub tag: Tag,
    pub blocks: Vec<Vec<u8>>,
}

impl Staged {
    pub fn block_count(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn frame(&self, index: u64) -> WireMessage {
        WireMessage::block(
            self.tag,
            index,
            self.blocks[index as usize].clone(),
            self.block_count(),
            false,
        )
    }
}

/// Bytes gzip cannot shrink much, so the staged blob spans several blocks
pub(crate) fn noise(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}

pub(crate) async fn stage(len: usize, password: &str) -> Staged {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    let staged = dir.path().join("staged.bin");
    let plain = noise(len);
    tokio::fs::write(&source, &plain).await.unwrap();

    let tag = Tag::generate().unwrap();
    compress_and_encrypt(&source, &staged, password, &tag)
        .await
        .unwrap();

    let bytes = tokio::fs::read(&staged).await.unwrap();
    let layout = BlockLayout::from_size(bytes.len() as u64);
    let blocks = bytes.chunks(BLOCK_SIZE).map(<[u8]>::to_vec).collect::<Vec<_>>();
    assert_eq!(blocks.len() as u64, layout.block_count);

    Staged {
        dir,
        source,
        plain,
        tag,
        blocks,
    }
}

pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig::default().with_pace_interval(Duration::from_millis(5))
}

/// Next frame on `sub`, skipping link events
pub(crate) async fn next_message(sub: &mut Subscription) -> (PeerId, WireMessage) {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), sub.events.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("transport closed");
        if let TransportEvent::Message { from, message } = event {
            return (from, message);
        }
    }
}

/// Whether a frame is already queued on `sub`
pub(crate) fn has_message(sub: &mut Subscription) -> bool {
    while let Ok(event) = sub.events.try_recv() {
        if matches!(event, TransportEvent::Message { .. }) {
            return true;
        }
    }
    false
}
