//! Event payload decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A decoded record from the event log.
///
/// `step` and `wall_time` are lifted out because every consumer wants them;
/// everything else is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub step: i64,
    #[serde(default)]
    pub wall_time: f64,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Payload failed to decode even though its frame verified.
#[derive(Debug, Error)]
#[error("invalid event payload: {0}")]
pub struct DecodeError(pub String);

/// Turns a verified frame payload into an event.
pub trait EventDecoder: Send + Sync {
    type Event: Send;

    fn decode(&self, payload: &[u8]) -> Result<Self::Event, DecodeError>;
}

/// Payloads are JSON objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventDecoder;

impl EventDecoder for JsonEventDecoder {
    type Event = Event;

    fn decode(&self, payload: &[u8]) -> Result<Event, DecodeError> {
        serde_json::from_slice(payload).map_err(|e| DecodeError(e.to_string()))
    }
}

/// Payloads are returned as raw bytes for decoders living elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawEventDecoder;

impl EventDecoder for RawEventDecoder {
    type Event = Vec<u8>;

    fn decode(&self, payload: &[u8]) -> Result<Vec<u8>, DecodeError> {
        Ok(payload.to_vec())
    }
}
