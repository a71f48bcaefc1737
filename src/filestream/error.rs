//! Multiplexer errors.

use thiserror::Error;

use super::chunk::ChunkType;
use super::delivery::DeliveryError;

/// Unrecoverable conditions that stop the multiplexer worker.
///
/// The worker returns these to whoever owns its task handle; that owner
/// decides whether to tear the process down.
#[derive(Debug, Error)]
pub enum FatalError {
    #[error("protocol violation: record has no message set")]
    MissingMessage,

    #[error("protocol violation: unknown message type {0:?}")]
    UnknownMessage(String),

    #[error("failed to encode {chunk_type} items: {source}")]
    Encode {
        chunk_type: ChunkType,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize stream update: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("multiplexer worker panicked: {0}")]
    WorkerPanicked(String),
}

impl FatalError {
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Self::MissingMessage | Self::UnknownMessage(_))
    }
}

/// The multiplexer no longer accepts records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("multiplexer is closed")]
pub struct SubmitError;
