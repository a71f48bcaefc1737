// Copyright 2024-2026 GG-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! `import`: run an event log through the multiplexer and print the chunks.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{segment_filter, StreamArgs};
use crate::config;
use crate::eventlog::{EventLogReader, JsonEventDecoder, LocalSegmentRoot};
use crate::filestream::{spawn_multiplexer, ChannelDelivery, StreamSession};
use crate::import::{import_available, import_events};

/// Run the command. Returns the process exit code.
pub async fn run_import(args: &StreamArgs, cancel: CancellationToken) -> i32 {
    let env = config::load();
    let mut reader = EventLogReader::with_decoder(
        Arc::new(LocalSegmentRoot::new(&args.dir)),
        Arc::new(segment_filter(&env, args.this_host)),
        JsonEventDecoder,
        env.reader.clone(),
    );

    let (delivery, mut chunks) = ChannelDelivery::new(env.delivery_capacity);
    let (handle, worker) = spawn_multiplexer(
        Arc::new(StreamSession::starting_now()),
        Arc::new(delivery),
        env.mux.clone(),
        CancellationToken::new(),
    );
    let printer = tokio::spawn(async move {
        while let Some(chunk) = chunks.recv().await {
            match serde_json::to_string(&chunk) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "cli: cannot print chunk"),
            }
        }
    });

    let imported = if args.follow {
        import_events(&mut reader, &handle, &cancel, env.poll_interval).await
    } else {
        import_available(&mut reader, &handle, &cancel).await
    };
    drop(handle);

    let mut code = 0;
    match imported {
        Ok(count) => tracing::info!(events = count, "cli: import finished"),
        Err(e) => {
            eprintln!("import failed: {e}");
            code = 1;
        }
    }
    match worker.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("multiplexer stopped: {e}");
            code = 1;
        }
        Err(e) => {
            eprintln!("multiplexer task failed: {e}");
            code = 1;
        }
    }
    if let Err(e) = printer.await {
        eprintln!("output task failed: {e}");
        code = 1;
    }
    code
}
