//! Spreader role.
//!
//! A spreader joins with a tag and a password only. It learns the block
//! count from the first frame that carries one, persists every new block at
//! its offset in the staging file, and once it holds all of them restores
//! the original file, broadcasts a completion ping and finishes. Blocks it
//! holds are reseeded to peers that lack them, both before and after it
//! finishes.

use super::{SessionContext, SessionState, SwarmRole};
use crate::event::SessionEvent;
use crate::peer::PeerId;
use crate::wire::WireMessage;
use crate::{Result, SessionError};
use async_trait::async_trait;
use peerfs_crypto::{Tag, decrypt_and_decompress};
use peerfs_files::{BLOCK_SIZE, BlockLayout, write_block};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use zeroize::Zeroizing;

/// Collects a tagged file from the swarm and reseeds it
pub struct Spreader {
    tag: Tag,
    output: PathBuf,
    password: Zeroizing<String>,
    written: BTreeSet<u64>,
    finished: bool,
}

impl Spreader {
    /// Spreader for `tag`, restoring into `output` with `password`
    pub fn new(tag: Tag, output: impl Into<PathBuf>, password: &str) -> Self {
        Self {
            tag,
            output: output.into(),
            password: Zeroizing::new(password.to_owned()),
            written: BTreeSet::new(),
            finished: false,
        }
    }

    fn is_complete(&self, block_count: u64) -> bool {
        block_count > 0 && self.written.len() as u64 == block_count
    }

    async fn persist(&mut self, ctx: &mut SessionContext, from: &PeerId, index: u64, data: &[u8]) {
        if let Err(e) = write_block(ctx.staging_path(), index, data).await {
            warn!(block = index, error = %e, "Failed to persist block");
            ctx.emit(SessionEvent::Error { error: e.into() });
            return;
        }

        let block_count = ctx.layout().block_count;
        if index + 1 == block_count {
            ctx.layout_mut().last_block_size = data.len();
        }
        self.written.insert(index);
        let written = self.written.len() as u64;
        ctx.update_status(|s| s.written = written);

        debug!(block = index, from = %from, written, block_count, "Wrote block");
        ctx.emit(SessionEvent::Written {
            block: index,
            credit: from.clone(),
            bytes: data.len(),
            block_count,
        });

        if !self.finished && self.is_complete(block_count) {
            self.complete(ctx).await;
        }
    }

    async fn complete(&mut self, ctx: &mut SessionContext) {
        self.finished = true;
        let block_count = ctx.layout().block_count;

        if let Err(e) =
            decrypt_and_decompress(ctx.staging_path(), &self.output, &self.password, &self.tag)
                .await
        {
            let err = SessionError::from(e);
            error!(tag = %self.tag, error = %err, "Failed to restore file");
            ctx.update_status(|s| {
                s.state = SessionState::Failed;
                s.error = Some(err.clone());
            });
            ctx.emit(SessionEvent::Error { error: err });
            return;
        }

        ctx.broadcast(&WireMessage::completion(self.tag, block_count))
            .await;
        ctx.set_state(SessionState::Finished);
        ctx.emit(SessionEvent::Finished);
        info!(
            tag = %self.tag,
            output = %self.output.display(),
            blocks = block_count,
            "File restored"
        );
    }
}

#[async_trait]
impl SwarmRole for Spreader {
    fn name(&self) -> &'static str {
        "spreader"
    }

    async fn preload(&mut self, _staging: &Path) -> Result<(Tag, BlockLayout)> {
        Ok((self.tag, BlockLayout::default()))
    }

    async fn on_peer_message(&mut self, ctx: &mut SessionContext, from: &PeerId, message: WireMessage) {
        if message.block_count.checked_mul(BLOCK_SIZE as u64).is_none() {
            warn!(
                peer = %from,
                block_count = message.block_count,
                "Dropping frame with unaddressable block count"
            );
            return;
        }

        let announced = if message.block_count > 0 {
            message.block_count
        } else {
            ctx.layout().block_count
        };
        if !message.empty {
            if message.block_n >= announced {
                warn!(
                    peer = %from,
                    block = message.block_n,
                    block_count = announced,
                    "Dropping frame for out-of-range block"
                );
                return;
            }
            if message.block_data.len() > BLOCK_SIZE {
                warn!(
                    peer = %from,
                    block = message.block_n,
                    len = message.block_data.len(),
                    "Dropping oversized block"
                );
                return;
            }
        }

        if message.block_count > 0 && message.block_count != ctx.layout().block_count {
            ctx.layout_mut().block_count = message.block_count;
            ctx.update_status(|s| s.block_count = message.block_count);
        }

        if message.is_done {
            ctx.peers_mut().mark_synced(from);
        } else {
            ctx.peers_mut().acknowledge(from, message.block_n);
        }

        if message.empty || self.written.contains(&message.block_n) {
            return;
        }

        self.persist(ctx, from, message.block_n, &message.block_data)
            .await;
    }

    fn should_spread(&self, ctx: &SessionContext) -> bool {
        ctx.layout().block_count > 0 && !self.written.is_empty() && ctx.peers().active_count() > 0
    }

    fn block_indices(&self, _ctx: &SessionContext) -> Vec<u64> {
        self.written.iter().copied().collect()
    }

    fn is_done(&self, ctx: &SessionContext) -> bool {
        self.is_complete(ctx.layout().block_count)
    }
}
