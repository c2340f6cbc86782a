//! # PeerFS Transport
//!
//! TCP mesh transport for PeerFS swarms.
//!
//! This crate provides:
//! - A listener that accepts peer links
//! - Outbound dialing of a static peer list
//! - Length-delimited JSON frames, opened by a hello frame naming the peer
//!
//! There is no discovery, NAT traversal or link encryption: block payloads
//! are already encrypted by the staging codec.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod tcp;

pub use tcp::TcpMesh;

use std::time::Duration;

/// TCP mesh configuration
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Largest accepted frame in bytes
    pub max_frame_len: usize,
    /// Time allowed for the hello exchange
    pub handshake_timeout: Duration,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            // A 256-byte block is under 400 bytes once base64'd in JSON.
            max_frame_len: 64 * 1024,
            handshake_timeout: Duration::from_secs(10),
        }
    }
}
