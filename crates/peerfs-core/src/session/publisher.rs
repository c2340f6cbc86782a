//! Publisher role.
//!
//! The publisher owns the original file. On start-up it generates a fresh
//! tag, stages the file (gzip, then AES-256-CTR keyed by the password) and
//! seeds every block to every connected peer that has not acknowledged it.
//! It never finishes.
//!
//! Outgoing frames always carry `isDone = true`, whether or not any peer has
//! the whole file. Spreaders therefore mark the publisher synced on its
//! first frame and never send blocks back to it.

use super::{SessionContext, SwarmRole};
use crate::Result;
use crate::peer::PeerId;
use crate::wire::WireMessage;
use async_trait::async_trait;
use peerfs_crypto::{Tag, compress_and_encrypt};
use peerfs_files::{BlockLayout, describe};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Seeds a local file to the swarm
pub struct Publisher {
    source: PathBuf,
    password: Zeroizing<String>,
}

impl Publisher {
    /// Publisher for `source`, encrypted with `password`
    pub fn new(source: impl Into<PathBuf>, password: &str) -> Self {
        Self {
            source: source.into(),
            password: Zeroizing::new(password.to_owned()),
        }
    }
}

#[async_trait]
impl SwarmRole for Publisher {
    fn name(&self) -> &'static str {
        "publisher"
    }

    async fn preload(&mut self, staging: &Path) -> Result<(Tag, BlockLayout)> {
        let tag = Tag::generate()?;
        compress_and_encrypt(&self.source, staging, &self.password, &tag).await?;
        let layout = describe(staging).await?;
        info!(
            source = %self.source.display(),
            tag = %tag,
            blocks = layout.block_count,
            "Staged file for publishing"
        );
        Ok((tag, layout))
    }

    async fn on_peer_message(&mut self, ctx: &mut SessionContext, from: &PeerId, message: WireMessage) {
        if message.is_done {
            debug!(peer = %from, "Peer reports completion");
            ctx.peers_mut().mark_synced(from);
        } else {
            ctx.peers_mut().acknowledge(from, message.block_n);
        }
    }

    fn should_spread(&self, ctx: &SessionContext) -> bool {
        ctx.peers().active_count() > 0
    }

    fn block_indices(&self, ctx: &SessionContext) -> Vec<u64> {
        (0..ctx.layout().block_count).collect()
    }

    fn is_done(&self, _ctx: &SessionContext) -> bool {
        true
    }
}
