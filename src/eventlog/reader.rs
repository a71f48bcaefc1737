//! Sequential reader over a rotating, append-while-open event log.
//!
//! One logical stream is split across segments whose names carry an
//! ascending sequence number. The reader consumes them strictly in order,
//! tails the newest one while the writer is still appending, and moves on
//! once it sits exactly at a frame boundary and a later segment exists.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;

use super::error::ReaderError;
use super::event::{EventDecoder, JsonEventDecoder};
use super::frame::{parse_frame, FrameParse};
use super::segment::{SegmentFilter, SegmentPath, SegmentRoot, SegmentStream};
use crate::telemetry;

/// Reader limits.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Largest payload accepted; longer verified lengths count as corruption.
    pub max_frame_len: u64,
    /// Bytes requested from the segment per read.
    pub read_chunk_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 64 * 1024 * 1024,
            read_chunk_size: 64 * 1024,
        }
    }
}

/// Where the reader stands between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    NoCurrentFile,
    ReadingFile,
    AdvancingToNextFile,
    /// At the end of the newest segment; waiting for the writer.
    Exhausted,
}

/// Position of the next unread frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub path: SegmentPath,
    pub offset: u64,
}

/// Sort key: sequence number first, name breaks ties.
type SegmentKey = (u64, String);

struct OpenSegment {
    path: SegmentPath,
    key: SegmentKey,
    stream: SegmentStream,
    /// Offset of the first byte of `pending` within the segment.
    offset: u64,
    /// Bytes read from the segment but not yet consumed as frames.
    pending: Vec<u8>,
}

impl OpenSegment {
    fn consume(&mut self, n: usize) {
        self.pending.drain(..n);
        self.offset += n as u64;
    }
}

enum ReadOutcome {
    Frame { payload: Range<usize>, consumed: usize },
    /// Some bytes of the next frame are missing.
    Partial,
    /// End of data exactly at a frame boundary.
    Boundary,
}

/// Reads decoded events from the segments of one stream, in order.
pub struct EventLogReader<D: EventDecoder = JsonEventDecoder> {
    root: Arc<dyn SegmentRoot>,
    filter: Arc<dyn SegmentFilter>,
    decoder: D,
    config: ReaderConfig,
    current: Option<OpenSegment>,
    state: ReaderState,
}

impl EventLogReader<JsonEventDecoder> {
    /// Reader for JSON event payloads with default limits.
    pub fn new(root: Arc<dyn SegmentRoot>, filter: Arc<dyn SegmentFilter>) -> Self {
        Self::with_decoder(root, filter, JsonEventDecoder, ReaderConfig::default())
    }
}

impl<D: EventDecoder> EventLogReader<D> {
    pub fn with_decoder(
        root: Arc<dyn SegmentRoot>,
        filter: Arc<dyn SegmentFilter>,
        decoder: D,
        config: ReaderConfig,
    ) -> Self {
        Self {
            root,
            filter,
            decoder,
            config,
            current: None,
            state: ReaderState::NoCurrentFile,
        }
    }

    /// Display location of the underlying root.
    pub fn location(&self) -> String {
        self.root.location()
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Current segment and offset, if a segment is open.
    pub fn cursor(&self) -> Option<Cursor> {
        self.current.as_ref().map(|seg| Cursor {
            path: seg.path.clone(),
            offset: seg.offset,
        })
    }

    /// Read the next event.
    ///
    /// Returns `Ok(None)` when nothing is available yet: no segments, a
    /// partly written frame, or the end of the newest segment. Calling again
    /// later resumes from the same position. `on_file_advance` is invoked
    /// once for every move from an exhausted segment to the next one.
    pub async fn next_event<F>(
        &mut self,
        cancel: &CancellationToken,
        mut on_file_advance: F,
    ) -> Result<Option<D::Event>, ReaderError>
    where
        F: FnMut(&SegmentPath),
    {
        if cancel.is_cancelled() {
            return Err(ReaderError::Cancelled);
        }

        if self.current.is_none() {
            match Self::open_after(&self.root, &self.filter, None, cancel).await? {
                Some(seg) => self.current = Some(seg),
                None => {
                    self.state = ReaderState::NoCurrentFile;
                    return Ok(None);
                }
            }
        }

        loop {
            let Some(seg) = self.current.as_mut() else {
                self.state = ReaderState::NoCurrentFile;
                return Ok(None);
            };
            self.state = ReaderState::ReadingFile;

            match read_frame(seg, &self.config, cancel).await? {
                ReadOutcome::Frame { payload, consumed } => {
                    let event = self.decoder.decode(&seg.pending[payload]).map_err(|source| {
                        ReaderError::Decode {
                            path: seg.path.location.clone(),
                            offset: seg.offset,
                            source,
                        }
                    })?;
                    seg.consume(consumed);
                    telemetry::record_event_read();
                    return Ok(Some(event));
                }
                ReadOutcome::Partial => return Ok(None),
                ReadOutcome::Boundary => {
                    self.state = ReaderState::AdvancingToNextFile;
                    let key = seg.key.clone();
                    let Some(next) = Self::open_after(&self.root, &self.filter, Some(&key), cancel).await? else {
                        self.state = ReaderState::Exhausted;
                        return Ok(None);
                    };
                    tracing::debug!(
                        from = %key.1,
                        to = %next.path,
                        "eventlog: advancing to next segment"
                    );
                    on_file_advance(&next.path);
                    self.current = Some(next);
                }
            }
        }
    }

    /// Open the first member segment sorting strictly after `after`.
    async fn open_after(
        root: &Arc<dyn SegmentRoot>,
        filter: &Arc<dyn SegmentFilter>,
        after: Option<&SegmentKey>,
        cancel: &CancellationToken,
    ) -> Result<Option<OpenSegment>, ReaderError> {
        let entries = cancellable(cancel, root.list())
            .await?
            .map_err(|source| ReaderError::Io {
                path: root.location(),
                source,
            })?;

        let next = entries
            .into_iter()
            .filter_map(|path| {
                let seq = filter.sequence(&path.name)?;
                Some(((seq, path.name.clone()), path))
            })
            .filter(|(key, _)| after.map_or(true, |after| key > after))
            .min_by(|(a, _), (b, _)| a.cmp(b));

        let Some((key, path)) = next else {
            return Ok(None);
        };

        let stream = cancellable(cancel, root.open(&path))
            .await?
            .map_err(|source| ReaderError::Io {
                path: path.location.clone(),
                source,
            })?;

        tracing::info!(segment = %path, sequence = key.0, "eventlog: opened segment");
        telemetry::record_segment_opened();

        Ok(Some(OpenSegment {
            path,
            key,
            stream,
            offset: 0,
            pending: Vec::new(),
        }))
    }
}

async fn read_frame(
    seg: &mut OpenSegment,
    config: &ReaderConfig,
    cancel: &CancellationToken,
) -> Result<ReadOutcome, ReaderError> {
    loop {
        match parse_frame(&seg.pending, config.max_frame_len) {
            Ok(FrameParse::Complete { payload, consumed }) => {
                return Ok(ReadOutcome::Frame { payload, consumed });
            }
            Ok(FrameParse::Incomplete) => {}
            Err(source) => {
                tracing::error!(
                    segment = %seg.path,
                    offset = seg.offset,
                    error = %source,
                    "eventlog: corrupt frame"
                );
                telemetry::record_corrupt_frame();
                return Err(ReaderError::Corruption {
                    path: seg.path.location.clone(),
                    offset: seg.offset,
                    source,
                });
            }
        }

        seg.pending.reserve(config.read_chunk_size);
        let n = cancellable(cancel, seg.stream.read_buf(&mut seg.pending))
            .await?
            .map_err(|source| ReaderError::Io {
                path: seg.path.location.clone(),
                source,
            })?;

        if n == 0 {
            return Ok(if seg.pending.is_empty() {
                ReadOutcome::Boundary
            } else {
                ReadOutcome::Partial
            });
        }
    }
}

/// Run `fut` unless `cancel` fires first. Reads dropped this way consume no
/// bytes, so the cursor stays put.
async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, ReaderError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ReaderError::Cancelled),
        out = fut => Ok(out),
    }
}

#[cfg(test)]
#[path = "reader_tests.rs"]
mod tests;
