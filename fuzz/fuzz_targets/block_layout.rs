//! Fuzz target for block layout arithmetic

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use peerfs_files::layout::MAX_BLOCK_COUNT;
use peerfs_files::{BLOCK_SIZE, BlockLayout};

#[derive(Debug, Arbitrary)]
struct Input {
    size: u32,
    index: u32,
}

fuzz_target!(|input: Input| {
    let size = u64::from(input.size);
    let layout = BlockLayout::from_size(size);
    assert_eq!(layout.size(), size);
    assert!(layout.last_block_size <= BLOCK_SIZE);

    let index = u64::from(input.index);
    assert!(layout.block_count <= MAX_BLOCK_COUNT);
    if layout.contains(index) {
        let offset = BlockLayout::offset(index).expect("in-range index has an offset");
        let end = offset + layout.block_len(index) as u64;
        assert!(end <= size);
    }
});
