//! Fuzz target for tag parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use peerfs_crypto::Tag;

fuzz_target!(|data: &[u8]| {
    if let Ok(tag) = Tag::from_slice(data) {
        assert_eq!(tag.as_bytes().as_slice(), data);
    }

    if let Ok(text) = std::str::from_utf8(data) {
        if let Ok(tag) = Tag::from_hex(text) {
            assert_eq!(tag.to_hex(), text.trim().to_lowercase());
        }
    }
});
