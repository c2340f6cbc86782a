//! Fuzz target for wire message decoding
//!
//! Arbitrary frames must decode or fail cleanly, and anything that decodes
//! must encode again.

#![no_main]

use libfuzzer_sys::fuzz_target;
use peerfs_core::WireMessage;

fuzz_target!(|data: &[u8]| {
    if let Ok(message) = WireMessage::decode(data) {
        let encoded = message.encode().expect("decoded message must encode");
        let again = WireMessage::decode(&encoded).expect("encoded message must decode");
        assert_eq!(again, message);
    }
});
