//! TCP mesh.
//!
//! Every link is one TCP stream framed with [`LengthDelimitedCodec`]. Both
//! sides open with a hello frame carrying their peer id; every later frame
//! is one JSON [`WireMessage`]. A link runs two tasks: a writer draining an
//! unbounded queue of encoded frames and a reader turning inbound frames
//! into transport events.

use crate::TcpConfig;
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use peerfs_core::transport::{
    Subscription, Transport, TransportError, TransportEvent, TransportResult, TransportStats,
};
use peerfs_core::{PeerId, WireMessage};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    hello: PeerId,
}

struct Link {
    conn_id: u64,
    frames: mpsc::UnboundedSender<Bytes>,
}

#[derive(Default)]
struct Counters {
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    send_errors: AtomicU64,
}

struct Inner {
    id: PeerId,
    config: TcpConfig,
    links: DashMap<PeerId, Link>,
    subscribers: DashMap<u64, mpsc::UnboundedSender<TransportEvent>>,
    next_id: AtomicU64,
    counters: Counters,
}

/// TCP transport connecting this node to a static set of peers
pub struct TcpMesh {
    inner: Arc<Inner>,
    local_addr: SocketAddr,
    accept: JoinHandle<()>,
}

impl TcpMesh {
    /// Listen on `addr` as peer `id`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address cannot be bound.
    pub async fn bind(addr: SocketAddr, id: PeerId) -> TransportResult<Self> {
        Self::bind_with_config(addr, id, TcpConfig::default()).await
    }

    /// Listen on `addr` as peer `id` with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BindFailed`] if the address cannot be bound.
    pub async fn bind_with_config(
        addr: SocketAddr,
        id: PeerId,
        config: TcpConfig,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| TransportError::BindFailed(format!("{addr}: {e}")))?;
        let local_addr = listener.local_addr()?;

        let inner = Arc::new(Inner {
            id,
            config,
            links: DashMap::new(),
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(0),
            counters: Counters::default(),
        });

        info!(peer = %inner.id, addr = %local_addr, "TCP mesh listening");
        let accept = tokio::spawn(accept_loop(inner.clone(), listener));

        Ok(Self {
            inner,
            local_addr,
            accept,
        })
    }

    /// Address the listener is bound to
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Open a link to the peer listening on `addr` and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or the hello exchange fails.
    pub async fn dial(&self, addr: SocketAddr) -> TransportResult<PeerId> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| TransportError::ConnectionFailed(format!("{addr}: {e}")))?;
        establish(self.inner.clone(), stream, addr).await
    }

    /// Peers with a live link
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<PeerId> = self.inner.links.iter().map(|l| l.key().clone()).collect();
        peers.sort();
        peers
    }

    /// Stop accepting and drop every link
    pub fn close(&self) {
        self.accept.abort();
        self.inner.links.clear();
    }
}

impl Drop for TcpMesh {
    fn drop(&mut self) {
        self.close();
    }
}

async fn accept_loop(inner: Arc<Inner>, listener: TcpListener) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let inner = inner.clone();
                tokio::spawn(async move {
                    if let Err(e) = establish(inner, stream, addr).await {
                        warn!(addr = %addr, error = %e, "Inbound handshake failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "Accept failed"),
        }
    }
}

async fn establish(
    inner: Arc<Inner>,
    stream: TcpStream,
    addr: SocketAddr,
) -> TransportResult<PeerId> {
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(inner.config.max_frame_len)
        .new_codec();
    let mut framed = Framed::new(stream, codec);

    let hello = serde_json::to_vec(&Hello {
        hello: inner.id.clone(),
    })?;
    framed.send(Bytes::from(hello)).await?;

    let first = tokio::time::timeout(inner.config.handshake_timeout, framed.next())
        .await
        .map_err(|_| TransportError::ConnectionFailed(format!("{addr}: hello timed out")))?
        .ok_or_else(|| TransportError::ConnectionFailed(format!("{addr}: closed before hello")))??;
    let Hello { hello: peer } = serde_json::from_slice(&first)?;

    if peer == inner.id {
        return Err(TransportError::ConnectionFailed(format!(
            "{addr}: refusing link to self"
        )));
    }

    let conn_id = inner.next_id.fetch_add(1, Ordering::Relaxed);
    let (frames, queue) = mpsc::unbounded_channel();
    let (sink, stream) = framed.split();

    if inner
        .links
        .insert(peer.clone(), Link { conn_id, frames })
        .is_some()
    {
        debug!(peer = %peer, "Replaced existing link");
    }
    info!(peer = %peer, addr = %addr, "Peer linked");
    inner.emit(TransportEvent::Connected(peer.clone()));

    tokio::spawn(write_loop(sink, queue, peer.clone()));
    tokio::spawn(read_loop(inner, stream, peer.clone(), conn_id));

    Ok(peer)
}

async fn write_loop(
    mut sink: futures::stream::SplitSink<Framed<TcpStream, LengthDelimitedCodec>, Bytes>,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    peer: PeerId,
) {
    while let Some(frame) = queue.recv().await {
        if let Err(e) = sink.send(frame).await {
            warn!(peer = %peer, error = %e, "Link write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

async fn read_loop(
    inner: Arc<Inner>,
    mut stream: futures::stream::SplitStream<Framed<TcpStream, LengthDelimitedCodec>>,
    peer: PeerId,
    conn_id: u64,
) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!(peer = %peer, error = %e, "Link read failed");
                break;
            }
        };
        inner
            .counters
            .bytes_received
            .fetch_add(frame.len() as u64, Ordering::Relaxed);

        match WireMessage::decode(&frame) {
            Ok(message) => {
                inner
                    .counters
                    .messages_received
                    .fetch_add(1, Ordering::Relaxed);
                inner.emit(TransportEvent::Message {
                    from: peer.clone(),
                    message,
                });
            }
            Err(e) => warn!(peer = %peer, error = %e, "Dropping malformed frame"),
        }
    }

    if inner
        .links
        .remove_if(&peer, |_, link| link.conn_id == conn_id)
        .is_some()
    {
        info!(peer = %peer, "Peer unlinked");
        inner.emit(TransportEvent::Disconnected(peer));
    }
}

impl Inner {
    fn emit(&self, event: TransportEvent) {
        self.subscribers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn queue(&self, peer: &PeerId, frame: Bytes) -> TransportResult<()> {
        let len = frame.len() as u64;
        let sent = self
            .links
            .get(peer)
            .is_some_and(|link| link.frames.send(frame).is_ok());
        if sent {
            self.counters.messages_sent.fetch_add(1, Ordering::Relaxed);
            self.counters.bytes_sent.fetch_add(len, Ordering::Relaxed);
            Ok(())
        } else {
            self.counters.send_errors.fetch_add(1, Ordering::Relaxed);
            Err(TransportError::NotConnected(peer.clone()))
        }
    }
}

#[async_trait]
impl Transport for TcpMesh {
    fn local_id(&self) -> &PeerId {
        &self.inner.id
    }

    fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.insert(id, tx);
        Subscription {
            active: self.peers(),
            events: rx,
        }
    }

    async fn send_to(&self, peer: &PeerId, message: &WireMessage) -> TransportResult<()> {
        let frame = Bytes::from(message.encode()?);
        self.inner.queue(peer, frame)
    }

    async fn broadcast(&self, message: &WireMessage) -> TransportResult<()> {
        let frame = Bytes::from(message.encode()?);
        for peer in self.peers() {
            if let Err(e) = self.inner.queue(&peer, frame.clone()) {
                warn!(peer = %peer, error = %e, "Broadcast delivery failed");
            }
        }
        Ok(())
    }

    fn stats(&self) -> TransportStats {
        let c = &self.inner.counters;
        TransportStats {
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            bytes_received: c.bytes_received.load(Ordering::Relaxed),
            messages_sent: c.messages_sent.load(Ordering::Relaxed),
            messages_received: c.messages_received.load(Ordering::Relaxed),
            send_errors: c.send_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerfs_crypto::Tag;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn mesh(name: &str) -> TcpMesh {
        TcpMesh::bind("127.0.0.1:0".parse().unwrap(), PeerId::from(name))
            .await
            .unwrap()
    }

    async fn next_event(sub: &mut Subscription) -> TransportEvent {
        timeout(Duration::from_secs(5), sub.events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    fn frame(n: u64) -> WireMessage {
        WireMessage::block(Tag::from_bytes([3; 16]), n, vec![n as u8; 256], 10, false)
    }

    #[tokio::test]
    async fn test_dial_links_both_sides() {
        let a = mesh("a").await;
        let b = mesh("b").await;
        let mut sub_a = a.subscribe();
        let mut sub_b = b.subscribe();

        let remote = a.dial(b.local_addr()).await.unwrap();
        assert_eq!(remote, PeerId::from("b"));

        assert_eq!(
            next_event(&mut sub_a).await,
            TransportEvent::Connected(PeerId::from("b"))
        );
        assert_eq!(
            next_event(&mut sub_b).await,
            TransportEvent::Connected(PeerId::from("a"))
        );
        assert_eq!(b.peers(), vec![PeerId::from("a")]);
    }

    #[tokio::test]
    async fn test_send_and_broadcast() {
        let a = mesh("a").await;
        let b = mesh("b").await;
        let c = mesh("c").await;
        let mut sub_b = b.subscribe();
        let mut sub_c = c.subscribe();

        a.dial(b.local_addr()).await.unwrap();
        a.dial(c.local_addr()).await.unwrap();
        assert!(matches!(next_event(&mut sub_b).await, TransportEvent::Connected(_)));
        assert!(matches!(next_event(&mut sub_c).await, TransportEvent::Connected(_)));

        a.send_to(&PeerId::from("b"), &frame(1)).await.unwrap();
        assert_eq!(
            next_event(&mut sub_b).await,
            TransportEvent::Message {
                from: PeerId::from("a"),
                message: frame(1)
            }
        );

        a.broadcast(&frame(2)).await.unwrap();
        for sub in [&mut sub_b, &mut sub_c] {
            match next_event(sub).await {
                TransportEvent::Message { message, .. } => assert_eq!(message.block_n, 2),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(a.stats().messages_sent, 3);
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let a = mesh("a").await;
        let err = a.send_to(&PeerId::from("nobody"), &frame(0)).await.unwrap_err();
        assert!(matches!(err, TransportError::NotConnected(_)));
        assert_eq!(a.stats().send_errors, 1);
    }

    #[tokio::test]
    async fn test_close_reports_disconnect() {
        let a = mesh("a").await;
        let b = mesh("b").await;
        let mut sub_b = b.subscribe();

        a.dial(b.local_addr()).await.unwrap();
        assert!(matches!(next_event(&mut sub_b).await, TransportEvent::Connected(_)));

        drop(a);
        assert_eq!(
            next_event(&mut sub_b).await,
            TransportEvent::Disconnected(PeerId::from("a"))
        );
        assert!(b.peers().is_empty());
    }

    #[tokio::test]
    async fn test_self_link_refused() {
        let a = mesh("a").await;
        assert!(a.dial(a.local_addr()).await.is_err());
    }
}
