//! # PeerFS Crypto
//!
//! Cryptographic primitives for the PeerFS swarm.
//!
//! This crate provides:
//! - Random content tags (the swarm address of a published file)
//! - Password key derivation
//! - The streaming staging codec (gzip, then AES-256-CTR)
//! - Secure random number generation
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Notes |
//! |----------|-----------|-------|
//! | Key derivation | SHA-256(password) | unsalted, single pass |
//! | Stream cipher | AES-256-CTR | IV = content tag |
//! | Compression | gzip | applied before encryption |
//!
//! The key derivation is weak by modern standards (no salt, no work factor).
//! It is kept as-is because every peer holding the same tag and password must
//! derive the same key stream.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod codec;
pub mod error;
pub mod hash;
pub mod random;
pub mod tag;

pub use codec::{compress_and_encrypt, decrypt_and_decompress};
pub use error::CryptoError;
pub use hash::{Key, derive_key};
pub use tag::Tag;

/// AES-256 key size
pub const KEY_SIZE: usize = 32;

/// AES-CTR initialization vector size
pub const IV_SIZE: usize = 16;

/// Content tag size in bytes
pub const TAG_SIZE: usize = 16;

// The tag doubles as the cipher IV.
const _: () = assert!(TAG_SIZE == IV_SIZE);
