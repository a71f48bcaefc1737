//! Metric helpers over the `metrics` facade.
//!
//! No recorder is installed here; the embedding process chooses one. Without
//! a recorder every call is a no-op.

use metrics::{counter, describe_counter, describe_gauge, gauge};

pub const EVENTS_READ: &str = "runstream_eventlog_events_read_total";
pub const SEGMENTS_OPENED: &str = "runstream_eventlog_segments_opened_total";
pub const CORRUPT_FRAMES: &str = "runstream_eventlog_corrupt_frames_total";
pub const RECORDS_SUBMITTED: &str = "runstream_filestream_records_submitted_total";
pub const CHUNKS_EMITTED: &str = "runstream_filestream_chunks_emitted_total";
pub const METRIC_PARSE_FAILURES: &str = "runstream_filestream_metric_parse_failures_total";
pub const STATS_SAMPLES_DROPPED: &str = "runstream_filestream_stats_samples_dropped_total";
pub const EVENTS_IMPORTED: &str = "runstream_import_events_total";
pub const IMPORT_ACTIVE: &str = "runstream_import_active";

/// Register metric descriptions with the installed recorder.
pub fn init_metrics() {
    describe_counter!(EVENTS_READ, "Events decoded from event log segments");
    describe_counter!(SEGMENTS_OPENED, "Event log segments opened for reading");
    describe_counter!(CORRUPT_FRAMES, "Frames that failed checksum or size validation");
    describe_counter!(RECORDS_SUBMITTED, "Records accepted by the multiplexer queue");
    describe_counter!(CHUNKS_EMITTED, "Chunks handed to delivery, by chunk type");
    describe_counter!(METRIC_PARSE_FAILURES, "System metric values dropped as unparsable");
    describe_counter!(STATS_SAMPLES_DROPPED, "System metric samples dropped entirely");
    describe_counter!(EVENTS_IMPORTED, "Events converted to history records");
    describe_gauge!(IMPORT_ACTIVE, "Event log importers currently running");
}

pub fn record_event_read() {
    counter!(EVENTS_READ).increment(1);
}

pub fn record_segment_opened() {
    counter!(SEGMENTS_OPENED).increment(1);
}

pub fn record_corrupt_frame() {
    counter!(CORRUPT_FRAMES).increment(1);
}

pub fn record_submission() {
    counter!(RECORDS_SUBMITTED).increment(1);
}

/// Count a delivered chunk under its type label.
pub fn record_chunk_emitted(chunk_type: &'static str) {
    counter!(CHUNKS_EMITTED, "type" => chunk_type).increment(1);
}

pub fn record_metric_parse_failure() {
    counter!(METRIC_PARSE_FAILURES).increment(1);
}

pub fn record_stats_sample_dropped() {
    counter!(STATS_SAMPLES_DROPPED).increment(1);
}

pub fn record_event_imported() {
    counter!(EVENTS_IMPORTED).increment(1);
}

/// Track running importers. Pass `true` on start and `false` on exit.
pub fn record_import_active(started: bool) {
    if started {
        gauge!(IMPORT_ACTIVE).increment(1.0);
    } else {
        gauge!(IMPORT_ACTIVE).decrement(1.0);
    }
}
