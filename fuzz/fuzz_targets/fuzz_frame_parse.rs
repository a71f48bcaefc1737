//! Fuzz target for event log frame parsing.
//!
//! Arbitrary bytes must never panic the parser, and every frame it accepts
//! must lie within the input.

#![no_main]

use libfuzzer_sys::fuzz_target;
use runstream_core::eventlog::{parse_frame, FrameParse};

fuzz_target!(|data: &[u8]| {
    let mut offset = 0;
    while let Ok(FrameParse::Complete { payload, consumed }) = parse_frame(&data[offset..], 1 << 20) {
        assert!(payload.end <= consumed);
        assert!(consumed <= data.len() - offset);
        offset += consumed;
    }
});
