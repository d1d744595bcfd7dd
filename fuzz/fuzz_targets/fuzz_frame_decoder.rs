//! Fuzz target: `FrameDecoder::feed`
//!
//! Drives arbitrary byte sequences into the streaming frame decoder, split
//! at a fuzzer-chosen point, and asserts that it never panics, always makes
//! progress and never yields an empty or oversized payload.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use envnode::rpc::codec::{FrameDecoder, MAX_FRAME_SIZE};
use libfuzzer_sys::fuzz_target;

fn drain(decoder: &mut FrameDecoder, mut data: &[u8]) {
    while !data.is_empty() {
        let (used, frame) = decoder.feed(data);
        if let Some(payload) = frame {
            assert!(payload.len() <= MAX_FRAME_SIZE, "payload exceeds MAX_FRAME_SIZE");
            assert!(!payload.is_empty(), "decoder must not yield empty payload");
        }
        assert!(used > 0 && used <= data.len(), "feed must consume input");
        data = &data[used..];
    }
}

fuzz_target!(|data: &[u8]| {
    let split = data.first().map_or(0, |b| *b as usize % (data.len().max(1)));
    let (head, tail) = data.split_at(split);

    let mut decoder = FrameDecoder::new();
    drain(&mut decoder, head);
    drain(&mut decoder, tail);

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert!(decoder.is_idle());
    drain(&mut decoder, data);
});
