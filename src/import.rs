//! Event log import.
//!
//! Tails a run's event log and feeds every decoded event into the
//! multiplexer as a history row, so externally written metrics end up in
//! the same ordered stream as in-process telemetry.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::eventlog::{Event, EventLogReader, ReaderError};
use crate::filestream::{HistoryUpdate, JsonItem, MuxHandle, SubmitError, TelemetryMessage};
use crate::telemetry::{self, ImportSpan, SpanExt};

pub const STEP_KEY: &str = "_step";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error("cannot forward events: {0}")]
    Submit(#[from] SubmitError),
}

/// History row for one event: `_step`, `_timestamp` and every other field.
pub fn event_to_history(event: &Event) -> HistoryUpdate {
    let mut items = Vec::with_capacity(event.fields.len() + 2);
    items.push(JsonItem::new(STEP_KEY, event.step.to_string()));
    items.push(JsonItem::new(
        crate::filestream::process::TIMESTAMP_KEY,
        Value::from(event.wall_time).to_string(),
    ));
    for (key, value) in &event.fields {
        items.push(JsonItem::new(key.clone(), value.to_string()));
    }
    HistoryUpdate { items }
}

/// Forward events from `reader` to `mux` until cancelled.
///
/// When the log has nothing new the importer waits `poll_interval` and
/// tries again. Cancellation ends the import cleanly and returns the number
/// of events forwarded; corruption or a closed multiplexer is an error.
pub async fn import_events(
    reader: &mut EventLogReader,
    mux: &MuxHandle,
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> Result<u64, ImportError> {
    let span = ImportSpan::new(&reader.location());
    telemetry::record_import_active(true);
    let result = follow(reader, mux, cancel, poll_interval)
        .instrument(span.clone())
        .await;
    telemetry::record_import_active(false);

    if let Ok(count) = &result {
        span.record("events", *count);
    }
    span.record_result(&result);
    result
}

/// Forward everything currently readable, then return.
///
/// Stops at the first point where the log has nothing new, or on
/// cancellation. Returns the number of events forwarded.
pub async fn import_available(
    reader: &mut EventLogReader,
    mux: &MuxHandle,
    cancel: &CancellationToken,
) -> Result<u64, ImportError> {
    let mut forwarded = 0u64;
    loop {
        let next = reader
            .next_event(cancel, |path| {
                tracing::debug!(segment = %path, "import: advanced to next segment");
            })
            .await;

        match next {
            Ok(Some(event)) => {
                mux.submit(TelemetryMessage::History(event_to_history(&event)))
                    .await?;
                forwarded += 1;
                telemetry::record_event_imported();
            }
            Ok(None) => return Ok(forwarded),
            Err(e) if e.is_cancelled() => return Ok(forwarded),
            Err(e) => {
                tracing::error!(error = %e, forwarded, "import: stopping");
                return Err(e.into());
            }
        }
    }
}

async fn follow(
    reader: &mut EventLogReader,
    mux: &MuxHandle,
    cancel: &CancellationToken,
    poll_interval: Duration,
) -> Result<u64, ImportError> {
    let mut forwarded = 0u64;
    loop {
        forwarded += import_available(reader, mux, cancel).await?;
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(forwarded),
            () = tokio::time::sleep(poll_interval) => {}
        }
    }
}
