//! Peer identity and block-possession tracking.

use crate::Result;
use peerfs_crypto::random::random_8;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Opaque peer handle assigned by the transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(String);

impl PeerId {
    /// Create from any string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Random identifier (16 hex chars)
    ///
    /// # Errors
    ///
    /// Returns an error if the OS CSPRNG fails.
    pub fn random() -> Result<Self> {
        Ok(Self(hex::encode(random_8()?)))
    }

    /// String form of the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What a session knows about one peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerRecord {
    /// Indices the peer is known to hold
    Known(HashSet<u64>),
    /// Peer holds everything; nothing more is sent to it this session
    Synced,
}

impl PeerRecord {
    /// Whether the peer still needs block `index`
    #[must_use]
    pub fn needs(&self, index: u64) -> bool {
        match self {
            PeerRecord::Known(held) => !held.contains(&index),
            PeerRecord::Synced => false,
        }
    }
}

/// Per-session peer bookkeeping
///
/// Only peers that are currently connected are tracked. Acknowledgements
/// from untracked peers are ignored.
#[derive(Debug, Default)]
pub struct PeerTable {
    records: HashMap<PeerId, PeerRecord>,
}

impl PeerTable {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `peer` with an empty known-set, replacing any old record
    pub fn register(&mut self, peer: PeerId) {
        self.records.insert(peer, PeerRecord::Known(HashSet::new()));
    }

    /// Stop tracking `peer`
    pub fn remove(&mut self, peer: &PeerId) -> Option<PeerRecord> {
        self.records.remove(peer)
    }

    /// Record that `peer` holds block `index`
    pub fn acknowledge(&mut self, peer: &PeerId, index: u64) {
        if let Some(PeerRecord::Known(held)) = self.records.get_mut(peer) {
            held.insert(index);
        }
    }

    /// Mark `peer` as holding every block
    pub fn mark_synced(&mut self, peer: &PeerId) {
        if let Some(record) = self.records.get_mut(peer) {
            *record = PeerRecord::Synced;
        }
    }

    /// Record of `peer`, if tracked
    #[must_use]
    pub fn get(&self, peer: &PeerId) -> Option<&PeerRecord> {
        self.records.get(peer)
    }

    /// Whether `peer` is tracked and still needs block `index`
    #[must_use]
    pub fn needs(&self, peer: &PeerId, index: u64) -> bool {
        self.records.get(peer).is_some_and(|r| r.needs(index))
    }

    /// Tracked peers that still need block `index`, in id order
    #[must_use]
    pub fn recipients(&self, index: u64) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self
            .records
            .iter()
            .filter(|(_, record)| record.needs(index))
            .map(|(peer, _)| peer.clone())
            .collect();
        peers.sort();
        peers
    }

    /// Number of tracked peers that are not synced
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.records
            .values()
            .filter(|r| !matches!(r, PeerRecord::Synced))
            .count()
    }

    /// Number of tracked peers
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no peer is tracked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
