//! Run telemetry plumbing.
//!
//! Two independent pipelines live here:
//!
//! - [`eventlog`] reads framed, checksummed event files that an external
//!   process writes next to a run, following file rotation and tailing the
//!   file that is still being written.
//! - [`filestream`] multiplexes typed telemetry records from any number of
//!   producers into ordered chunks for the file stream service.
//!
//! [`import`] connects the two, turning decoded events into history rows.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod eventlog;
pub mod filestream;
pub mod import;
pub mod telemetry;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use filestream::{spawn_multiplexer, Delivery, FatalError, MuxConfig, MuxHandle, StreamSession};

/// A running multiplexer together with the token that stops it.
pub struct RunStream {
    handle: MuxHandle,
    worker: JoinHandle<Result<(), FatalError>>,
    shutdown: CancellationToken,
}

impl RunStream {
    /// Start the multiplexer worker on the current runtime.
    pub fn start(session: StreamSession, delivery: Arc<dyn Delivery>, config: MuxConfig) -> Self {
        let shutdown = CancellationToken::new();
        tracing::info!(queue_capacity = config.queue_capacity, "runstream: starting");
        let (handle, worker) =
            spawn_multiplexer(Arc::new(session), delivery, config, shutdown.clone());
        Self {
            handle,
            worker,
            shutdown,
        }
    }

    /// Producer handle; clone freely.
    pub fn handle(&self) -> MuxHandle {
        self.handle.clone()
    }

    /// Stop accepting records, drain what was queued and wait for the worker.
    pub async fn finish(self) -> Result<(), FatalError> {
        self.shutdown.cancel();
        drop(self.handle);
        match self.worker.await {
            Ok(result) => result,
            Err(e) => Err(FatalError::WorkerPanicked(e.to_string())),
        }
    }
}
