//! Event log reader errors.
//!
//! Transient conditions (a partly written frame, no segment yet, an empty
//! segment) are not errors; the reader reports them as `Ok(None)`.

use thiserror::Error;

use super::event::DecodeError;
use super::frame::FrameError;

/// Errors surfaced by `EventLogReader::next_event`.
#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("corrupt frame in {path} at offset {offset}: {source}")]
    Corruption {
        path: String,
        offset: u64,
        #[source]
        source: FrameError,
    },

    #[error("undecodable event in {path} at offset {offset}: {source}")]
    Decode {
        path: String,
        offset: u64,
        #[source]
        source: DecodeError,
    },

    #[error("read cancelled")]
    Cancelled,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    /// Corruption and decode failures mean the log itself is bad.
    pub fn is_data_error(&self) -> bool {
        matches!(self, Self::Corruption { .. } | Self::Decode { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
