//! In-process memory mesh.
//!
//! A [`MemoryMesh`] is a set of named endpoints plus an undirected link
//! graph the caller edits with [`MemoryMesh::connect`] and
//! [`MemoryMesh::disconnect`]. Frames are encoded and decoded on every hop
//! so the wire format is exercised exactly as on a socket.

use super::{Subscription, Transport, TransportError, TransportEvent, TransportResult, TransportStats};
use crate::peer::PeerId;
use crate::wire::WireMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Default)]
struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    send_errors: AtomicU64,
}

#[derive(Debug, Default)]
struct MeshNode {
    links: HashSet<PeerId>,
    subscribers: Vec<mpsc::UnboundedSender<TransportEvent>>,
    counters: Arc<Counters>,
}

/// Shared in-process mesh
#[derive(Debug, Clone, Default)]
pub struct MemoryMesh {
    nodes: Arc<DashMap<PeerId, MeshNode>>,
}

impl MemoryMesh {
    /// Create an empty mesh
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Endpoint named `name`. Asking twice for the same name yields two
    /// handles on the same node.
    pub fn endpoint(&self, name: impl Into<String>) -> MemoryEndpoint {
        let id = PeerId::new(name);
        let counters = self.nodes.entry(id.clone()).or_default().counters.clone();
        MemoryEndpoint {
            id,
            mesh: self.clone(),
            counters,
        }
    }

    /// Link `a` and `b`; both sides see a `Connected` event
    pub fn connect(&self, a: &PeerId, b: &PeerId) {
        if a == b {
            return;
        }
        let added_a = self.nodes.entry(a.clone()).or_default().links.insert(b.clone());
        let added_b = self.nodes.entry(b.clone()).or_default().links.insert(a.clone());
        if added_a {
            self.notify(a, TransportEvent::Connected(b.clone()));
        }
        if added_b {
            self.notify(b, TransportEvent::Connected(a.clone()));
        }
    }

    /// Unlink `a` and `b`; both sides see a `Disconnected` event
    pub fn disconnect(&self, a: &PeerId, b: &PeerId) {
        let removed_a = self.nodes.get_mut(a).is_some_and(|mut n| n.links.remove(b));
        let removed_b = self.nodes.get_mut(b).is_some_and(|mut n| n.links.remove(a));
        if removed_a {
            self.notify(a, TransportEvent::Disconnected(b.clone()));
        }
        if removed_b {
            self.notify(b, TransportEvent::Disconnected(a.clone()));
        }
    }

    /// Whether `a` and `b` are linked
    #[must_use]
    pub fn is_connected(&self, a: &PeerId, b: &PeerId) -> bool {
        self.nodes.get(a).is_some_and(|n| n.links.contains(b))
    }

    fn links_of(&self, id: &PeerId) -> Vec<PeerId> {
        let mut links: Vec<PeerId> = self
            .nodes
            .get(id)
            .map(|n| n.links.iter().cloned().collect())
            .unwrap_or_default();
        links.sort();
        links
    }

    fn notify(&self, id: &PeerId, event: TransportEvent) {
        if let Some(mut node) = self.nodes.get_mut(id) {
            node.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    fn deliver(&self, from: &PeerId, to: &PeerId, frame: &[u8]) -> TransportResult<()> {
        let message = WireMessage::decode(frame)?;
        let mut node = self
            .nodes
            .get_mut(to)
            .ok_or_else(|| TransportError::NotConnected(to.clone()))?;

        node.counters.messages_received.fetch_add(1, Ordering::Relaxed);
        node.counters
            .bytes_received
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        node.subscribers.retain(|tx| {
            tx.send(TransportEvent::Message {
                from: from.clone(),
                message: message.clone(),
            })
            .is_ok()
        });
        Ok(())
    }
}

/// One node's handle on a [`MemoryMesh`]
#[derive(Debug, Clone)]
pub struct MemoryEndpoint {
    id: PeerId,
    mesh: MemoryMesh,
    counters: Arc<Counters>,
}

impl MemoryEndpoint {
    /// Mesh this endpoint belongs to
    #[must_use]
    pub fn mesh(&self) -> &MemoryMesh {
        &self.mesh
    }

    fn record_send(&self, bytes: usize) {
        self.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.counters
            .bytes_sent
            .fetch_add(bytes as u64, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl Transport for MemoryEndpoint {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut node = self.mesh.nodes.entry(self.id.clone()).or_default();
        node.subscribers.push(tx);
        let mut active: Vec<PeerId> = node.links.iter().cloned().collect();
        active.sort();
        Subscription { active, events: rx }
    }

    async fn send_to(&self, peer: &PeerId, message: &WireMessage) -> TransportResult<()> {
        if !self.mesh.is_connected(&self.id, peer) {
            self.record_error();
            return Err(TransportError::NotConnected(peer.clone()));
        }
        let frame = message.encode()?;
        self.mesh.deliver(&self.id, peer, &frame)?;
        self.record_send(frame.len());
        Ok(())
    }

    async fn broadcast(&self, message: &WireMessage) -> TransportResult<()> {
        let frame = message.encode()?;
        for peer in self.mesh.links_of(&self.id) {
            match self.mesh.deliver(&self.id, &peer, &frame) {
                Ok(()) => self.record_send(frame.len()),
                Err(e) => {
                    self.record_error();
                    tracing::warn!(peer = %peer, error = %e, "Broadcast delivery failed");
                }
            }
        }
        Ok(())
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            bytes_sent: self.counters.bytes_sent.load(Ordering::Relaxed),
            bytes_received: self.counters.bytes_received.load(Ordering::Relaxed),
            messages_sent: self.counters.messages_sent.load(Ordering::Relaxed),
            messages_received: self.counters.messages_received.load(Ordering::Relaxed),
            send_errors: self.counters.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerfs_crypto::Tag;

    fn msg(n: u64) -> WireMessage {
        WireMessage::block(Tag::from_bytes([1; 16]), n, vec![n as u8; 4], 8, false)
    }

    #[tokio::test]
    async fn test_connect_notifies_both_sides() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let b = mesh.endpoint("b");
        let mut sub_a = a.subscribe();
        let mut sub_b = b.subscribe();
        assert!(sub_a.active.is_empty());

        mesh.connect(a.local_id(), b.local_id());

        assert_eq!(
            sub_a.events.recv().await,
            Some(TransportEvent::Connected(PeerId::from("b")))
        );
        assert_eq!(
            sub_b.events.recv().await,
            Some(TransportEvent::Connected(PeerId::from("a")))
        );
    }

    #[tokio::test]
    async fn test_connect_twice_notifies_once() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let mut sub = a.subscribe();
        mesh.connect(&PeerId::from("a"), &PeerId::from("b"));
        mesh.connect(&PeerId::from("b"), &PeerId::from("a"));
        mesh.disconnect(&PeerId::from("a"), &PeerId::from("b"));

        assert!(matches!(
            sub.events.recv().await,
            Some(TransportEvent::Connected(_))
        ));
        assert!(matches!(
            sub.events.recv().await,
            Some(TransportEvent::Disconnected(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_lists_active_peers() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        mesh.connect(&PeerId::from("a"), &PeerId::from("c"));
        mesh.connect(&PeerId::from("a"), &PeerId::from("b"));

        let sub = a.subscribe();
        assert_eq!(sub.active, vec![PeerId::from("b"), PeerId::from("c")]);
    }

    #[tokio::test]
    async fn test_send_to_delivers_with_sender() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let b = mesh.endpoint("b");
        mesh.connect(a.local_id(), b.local_id());
        let mut sub = b.subscribe();

        a.send_to(b.local_id(), &msg(3)).await.unwrap();

        match sub.events.recv().await {
            Some(TransportEvent::Message { from, message }) => {
                assert_eq!(from, PeerId::from("a"));
                assert_eq!(message, msg(3));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(a.stats().messages_sent, 1);
        assert_eq!(b.stats().messages_received, 1);
    }

    #[tokio::test]
    async fn test_send_to_unlinked_peer_fails() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let _b = mesh.endpoint("b");

        let err = a.send_to(&PeerId::from("b"), &msg(0)).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(_)));
        assert_eq!(a.stats().send_errors, 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_linked_peers_only() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let b = mesh.endpoint("b");
        let c = mesh.endpoint("c");
        let d = mesh.endpoint("d");
        mesh.connect(a.local_id(), b.local_id());
        mesh.connect(a.local_id(), c.local_id());
        let mut sub_b = b.subscribe();
        let mut sub_c = c.subscribe();
        let mut sub_d = d.subscribe();

        a.broadcast(&msg(1)).await.unwrap();

        assert!(matches!(
            sub_b.events.recv().await,
            Some(TransportEvent::Message { .. })
        ));
        assert!(matches!(
            sub_c.events.recv().await,
            Some(TransportEvent::Message { .. })
        ));
        assert!(sub_d.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let mesh = MemoryMesh::new();
        let a = mesh.endpoint("a");
        let b = mesh.endpoint("b");
        mesh.connect(a.local_id(), b.local_id());

        drop(b.subscribe());
        let mut live = b.subscribe();
        a.send_to(b.local_id(), &msg(0)).await.unwrap();

        assert!(live.events.recv().await.is_some());
        assert_eq!(mesh.nodes.get(b.local_id()).unwrap().subscribers.len(), 1);
    }
}
