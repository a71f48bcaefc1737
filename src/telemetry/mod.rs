//! Logging, spans and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    init_metrics, record_chunk_emitted, record_corrupt_frame, record_event_imported,
    record_event_read, record_import_active, record_metric_parse_failure,
    record_segment_opened, record_stats_sample_dropped, record_submission,
};
pub use spans::{ImportSpan, SpanExt};
