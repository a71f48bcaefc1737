//! Binary event log ingestion.
//!
//! Reads the framed, checksummed event files an external process writes
//! next to a run (TensorBoard `tfevents` logs), across file rotations and
//! while the newest file is still being appended to.

mod error;
pub mod event;
pub mod frame;
mod reader;
pub mod segment;

pub use error::ReaderError;
pub use event::{DecodeError, Event, EventDecoder, JsonEventDecoder, RawEventDecoder};
pub use frame::{encode_frame, parse_frame, FrameError, FrameParse};
pub use reader::{Cursor, EventLogReader, ReaderConfig, ReaderState};
pub use segment::{
    LocalSegmentRoot, ObjectSegmentRoot, SegmentFilter, SegmentPath, SegmentRoot, SegmentStream,
    TfEventsFilter,
};
