// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `tail`: print decoded events as JSON lines.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{segment_filter, StreamArgs};
use crate::config;
use crate::eventlog::{EventLogReader, LocalSegmentRoot, ReaderError};

/// Run the command. Returns the process exit code.
pub async fn run_tail(args: &StreamArgs, cancel: CancellationToken) -> i32 {
    let env = config::load();
    let filter = segment_filter(&env, args.this_host);
    let mut reader = EventLogReader::with_decoder(
        Arc::new(LocalSegmentRoot::new(&args.dir)),
        Arc::new(filter),
        crate::eventlog::JsonEventDecoder,
        env.reader.clone(),
    );

    let mut out = std::io::stdout();
    match tail_events(&mut reader, &mut out, args.follow, env.poll_interval, &cancel).await {
        Ok(count) => {
            tracing::info!(events = count, "cli: tail finished");
            0
        }
        Err(e) => {
            eprintln!("tail failed: {e}");
            1
        }
    }
}

/// Write events from `reader` to `out`, one JSON object per line.
///
/// Without `follow` this stops the first time the log has nothing new.
pub async fn tail_events<W: Write>(
    reader: &mut EventLogReader,
    out: &mut W,
    follow: bool,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<u64, ReaderError> {
    let mut count = 0u64;
    loop {
        match reader.next_event(cancel, |_| {}).await {
            Ok(Some(event)) => {
                let line = serde_json::to_string(&event).map_err(|e| ReaderError::Io {
                    path: reader.location(),
                    source: e.into(),
                })?;
                writeln!(out, "{line}").map_err(|source| ReaderError::Io {
                    path: "stdout".into(),
                    source,
                })?;
                count += 1;
            }
            Ok(None) if !follow => return Ok(count),
            Ok(None) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Ok(count),
                    () = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) if e.is_cancelled() => return Ok(count),
            Err(e) => return Err(e),
        }
    }
}
