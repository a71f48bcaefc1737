//! Handoff to the delivery stage.
//!
//! The delivery stage batches chunks and ships them with retry and
//! backpressure. This crate only relies on it accepting chunks in order.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::chunk::Chunk;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("delivery stage is closed")]
    Closed,
}

/// Ordered consumer of chunks.
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Accept one chunk. Waiting here applies backpressure to the worker.
    async fn deliver(&self, chunk: Chunk) -> Result<(), DeliveryError>;
}

/// Delivery into a bounded channel read by the transport task.
#[derive(Debug, Clone)]
pub struct ChannelDelivery {
    tx: mpsc::Sender<Chunk>,
}

impl ChannelDelivery {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Chunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Delivery for ChannelDelivery {
    async fn deliver(&self, chunk: Chunk) -> Result<(), DeliveryError> {
        self.tx.send(chunk).await.map_err(|_| DeliveryError::Closed)
    }
}
