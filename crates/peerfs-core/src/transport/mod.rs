//! Transport contract.
//!
//! Sessions need four things from the network: connect and disconnect
//! notifications, inbound message delivery, unicast and broadcast. Any
//! implementation of [`Transport`] can carry a swarm; [`memory::MemoryMesh`]
//! is the in-process one used by tests and embedders.

pub mod memory;

use crate::peer::PeerId;
use crate::wire::WireMessage;
use async_trait::async_trait;
use std::io;
use tokio::sync::mpsc;

/// Transport layer errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No link to the destination peer
    #[error("Peer {0} is not connected")]
    NotConnected(PeerId),

    /// Address binding failed
    #[error("Failed to bind to address: {0}")]
    BindFailed(String),

    /// Connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Codec(err.to_string())
    }
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Something that happened on the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A peer link came up
    Connected(PeerId),
    /// A peer link went down
    Disconnected(PeerId),
    /// A frame arrived
    Message {
        /// Sending peer
        from: PeerId,
        /// Decoded frame
        message: WireMessage,
    },
}

/// A live view of the transport
///
/// `active` lists the peers connected at subscription time; `events`
/// delivers everything that happens afterwards, in order.
#[derive(Debug)]
pub struct Subscription {
    /// Peers connected when the subscription was taken
    pub active: Vec<PeerId>,
    /// Subsequent events
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Async transport trait for swarm traffic.
///
/// # Examples
///
/// ```no_run
/// use peerfs_core::transport::Transport;
/// use peerfs_core::transport::memory::MemoryMesh;
/// use peerfs_core::{Tag, WireMessage};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mesh = MemoryMesh::new();
/// let alice = mesh.endpoint("alice");
/// let bob = mesh.endpoint("bob");
/// mesh.connect(alice.local_id(), bob.local_id());
///
/// let mut sub = bob.subscribe();
/// alice.broadcast(&WireMessage::completion(Tag::generate()?, 4)).await?;
/// let event = sub.events.recv().await;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Identity of this endpoint as seen by its peers
    fn local_id(&self) -> &PeerId;

    /// Take a new subscription.
    ///
    /// Each subscriber receives every event; sessions filter by tag.
    fn subscribe(&self) -> Subscription;

    /// Send a frame to one peer.
    ///
    /// # Errors
    /// Returns `TransportError` if the peer is unknown or the send fails
    async fn send_to(&self, peer: &PeerId, message: &WireMessage) -> TransportResult<()>;

    /// Send a frame to every connected peer.
    ///
    /// # Errors
    /// Returns `TransportError` if the frame cannot be encoded
    async fn broadcast(&self, message: &WireMessage) -> TransportResult<()>;

    /// Get transport statistics (optional).
    fn stats(&self) -> TransportStats {
        TransportStats::default()
    }
}

/// Transport statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Total bytes received
    pub bytes_received: u64,
    /// Frames sent
    pub messages_sent: u64,
    /// Frames received
    pub messages_received: u64,
    /// Send errors
    pub send_errors: u64,
}
