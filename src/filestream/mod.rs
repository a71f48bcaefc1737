//! Telemetry multiplexer.
//!
//! Turns typed run telemetry records into ordered chunks for the file
//! stream service: history rows, summary snapshots, console output, system
//! metric samples and control signals.

mod chunk;
mod delivery;
mod error;
pub mod message;
mod mux;
pub mod process;
mod session;

pub use chunk::{Chunk, ChunkType, ControlFields};
pub use delivery::{ChannelDelivery, Delivery, DeliveryError};
pub use error::{FatalError, SubmitError};
pub use message::{
    FilesUploaded, HistoryUpdate, JsonItem, OutputLine, Record, RunExit, StatsItem,
    StatsSnapshot, StreamUpdate, StreamValue, SummaryUpdate, TelemetryMessage, Timestamp,
};
pub use mux::{spawn_multiplexer, Multiplexer, MuxConfig, MuxHandle};
pub use process::{jsonify_items, ChunkProcessor};
pub use session::StreamSession;
