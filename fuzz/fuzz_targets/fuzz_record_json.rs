//! Fuzz target for JSON record decoding and processing.
//!
//! Arbitrary input must either fail to decode or process to a chunk or a
//! fatal error, never a panic.

#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;
use runstream_core::filestream::{ChunkProcessor, Record, StreamSession};

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = Record::from_json(data) {
        let processor = ChunkProcessor::new(Arc::new(StreamSession::new(0.0)));
        let _ = processor.process(record);
    }
});
