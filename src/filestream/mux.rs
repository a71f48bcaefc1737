//! Single-worker telemetry multiplexer.
//!
//! Any number of producers submit records through cloned handles; one
//! worker drains the queue in order and forwards chunks to delivery. The
//! service appends each chunk type at its own offset, so this single
//! consumer is what keeps per-type order intact.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::delivery::Delivery;
use super::error::{FatalError, SubmitError};
use super::message::Record;
use super::process::ChunkProcessor;
use super::session::StreamSession;
use crate::telemetry;

/// Configuration for the multiplexer queue.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Records buffered ahead of the worker before producers wait.
    pub queue_capacity: usize,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self { queue_capacity: 256 }
    }
}

/// Producer side of the multiplexer. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MuxHandle {
    tx: mpsc::Sender<Record>,
}

impl MuxHandle {
    /// Queue a record. Waits only while the queue is full.
    pub async fn submit(&self, record: impl Into<Record>) -> Result<(), SubmitError> {
        self.tx.send(record.into()).await.map_err(|_| SubmitError)?;
        telemetry::record_submission();
        Ok(())
    }

    /// Queue a record from synchronous code. Must not be called from
    /// within an async runtime thread.
    pub fn blocking_submit(&self, record: impl Into<Record>) -> Result<(), SubmitError> {
        self.tx.blocking_send(record.into()).map_err(|_| SubmitError)?;
        telemetry::record_submission();
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side: owns the queue, the processor and the delivery stage.
pub struct Multiplexer {
    rx: mpsc::Receiver<Record>,
    processor: ChunkProcessor,
    delivery: Arc<dyn Delivery>,
    shutdown: CancellationToken,
}

impl Multiplexer {
    pub fn new(
        session: Arc<StreamSession>,
        delivery: Arc<dyn Delivery>,
        config: MuxConfig,
        shutdown: CancellationToken,
    ) -> (Self, MuxHandle) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let mux = Self {
            rx,
            processor: ChunkProcessor::new(session),
            delivery,
            shutdown,
        };
        (mux, MuxHandle { tx })
    }

    /// Drain records until every handle is dropped or shutdown is signalled.
    ///
    /// Shutdown closes the queue to new records; everything already queued
    /// is still processed and delivered. A fatal error stops the worker
    /// immediately and is returned to the task owner.
    pub async fn process(mut self) -> Result<(), FatalError> {
        let mut draining = false;
        loop {
            let record = tokio::select! {
                biased;
                () = self.shutdown.cancelled(), if !draining => {
                    tracing::info!("filestream: shutdown signal received, draining queue");
                    self.rx.close();
                    draining = true;
                    continue;
                }
                record = self.rx.recv() => record,
            };
            let Some(record) = record else { break };

            let chunk = match self.processor.process(record) {
                Ok(Some(chunk)) => chunk,
                Ok(None) => continue,
                Err(e) => {
                    tracing::error!(error = %e, "filestream: fatal error, stopping worker");
                    return Err(e);
                }
            };

            let chunk_type = chunk.chunk_type();
            if let Err(e) = self.delivery.deliver(chunk).await {
                tracing::error!(error = %e, chunk_type = %chunk_type, "filestream: delivery failed");
                return Err(e.into());
            }
            telemetry::record_chunk_emitted(chunk_type.as_str());
        }

        tracing::debug!("filestream: closed");
        Ok(())
    }
}

/// Spawn the worker. The returned task yields the worker's outcome.
pub fn spawn_multiplexer(
    session: Arc<StreamSession>,
    delivery: Arc<dyn Delivery>,
    config: MuxConfig,
    shutdown: CancellationToken,
) -> (MuxHandle, JoinHandle<Result<(), FatalError>>) {
    let (mux, handle) = Multiplexer::new(session, delivery, config, shutdown);
    (handle, tokio::spawn(mux.process()))
}
