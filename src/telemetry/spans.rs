//! Span helpers for long-running ingestion tasks.

use tracing::{info_span, Span};

/// Record an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Span covering one event log import.
///
/// `events` and `status` are filled in when the import ends.
pub struct ImportSpan;

impl ImportSpan {
    pub fn new(location: &str) -> Span {
        info_span!(
            "eventlog_import",
            location = %location,
            events = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
        )
    }
}
