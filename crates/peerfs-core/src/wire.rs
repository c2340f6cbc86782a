//! Wire message format.
//!
//! Every frame exchanged by peers is one JSON object:
//!
//! ```json
//! {"tag":"<32 hex chars>","blockN":3,"blockData":"<base64>","blockCount":4,"isDone":false,"empty":false}
//! ```
//!
//! Only `tag` is required. `blockN`, `blockData`, `blockCount`, `isDone` and
//! `empty` may be omitted and then take their zero value, so a bare
//! completion ping `{"tag":..,"isDone":true,"empty":true}` decodes.

use peerfs_crypto::Tag;
use serde::{Deserialize, Serialize};

/// One gossip frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Content tag of the session this frame belongs to
    #[serde(with = "tag_hex")]
    pub tag: Tag,

    /// Block index
    #[serde(default)]
    pub block_n: u64,

    /// Block payload
    #[serde(default, with = "base64_bytes")]
    pub block_data: Vec<u8>,

    /// Number of blocks in the staging blob, as known by the sender
    #[serde(default)]
    pub block_count: u64,

    /// Sender holds every block
    #[serde(default)]
    pub is_done: bool,

    /// Frame carries no block (completion ping)
    #[serde(default)]
    pub empty: bool,
}

impl WireMessage {
    /// Frame carrying block `block_n`
    #[must_use]
    pub fn block(tag: Tag, block_n: u64, block_data: Vec<u8>, block_count: u64, is_done: bool) -> Self {
        Self {
            tag,
            block_n,
            block_data,
            block_count,
            is_done,
            empty: false,
        }
    }

    /// Completion ping sent once a spreader has restored the file
    #[must_use]
    pub fn completion(tag: Tag, block_count: u64) -> Self {
        Self {
            tag,
            block_n: 0,
            block_data: Vec::new(),
            block_count,
            is_done: true,
            empty: true,
        }
    }

    /// Serialize to JSON bytes
    ///
    /// # Errors
    ///
    /// Returns an error only if serialization itself fails.
    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Parse from JSON bytes
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, a tag that is not 16 hex-encoded
    /// bytes, or invalid base64 in `blockData`.
    pub fn decode(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

mod tag_hex {
    use peerfs_crypto::Tag;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(tag: &Tag, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&tag.to_hex())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Tag, D::Error> {
        let text = String::deserialize(deserializer)?;
        Tag::from_hex(&text).map_err(de::Error::custom)
    }
}

mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(de::Error::custom)
    }
}
