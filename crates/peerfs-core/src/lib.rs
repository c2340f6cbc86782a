//! # PeerFS Core
//!
//! Swarm protocol for PeerFS: password-protected file distribution over a
//! gossiping set of peers.
//!
//! This crate provides:
//! - The session engine (peer bookkeeping, paced gossip rounds, lifecycle)
//! - The publisher and spreader roles
//! - The wire message format
//! - The transport contract and an in-process memory mesh
//! - The [`Swarm`] facade
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Swarm                                    │
//! │   (publish / download over one transport handle)                │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    Session engine                                │
//! │   (one task per session: peers, pacing rounds, role hooks)      │
//! ├──────────────────────────────┬──────────────────────────────────┤
//! │          Publisher           │            Spreader               │
//! │   (stages and seeds a file)  │   (collects, restores, reseeds)  │
//! ├──────────────────────────────┴──────────────────────────────────┤
//! │                       Transport                                  │
//! │   (connect / disconnect / message events, unicast, broadcast)   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod event;
pub mod peer;
pub mod session;
pub mod swarm;
pub mod transport;
pub mod wire;

pub use config::SessionConfig;
pub use error::{Result, SessionError};
pub use event::{EventKind, SessionEvent};
pub use peer::{PeerId, PeerRecord, PeerTable};
pub use session::{SessionHandle, SessionState, SessionStatus, SwarmRole};
pub use swarm::Swarm;
pub use transport::{Subscription, Transport, TransportError, TransportEvent};
pub use wire::WireMessage;

pub use peerfs_crypto::Tag;
pub use peerfs_files::{BLOCK_SIZE, BlockLayout};
