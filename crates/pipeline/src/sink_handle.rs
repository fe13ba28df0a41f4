//! Sink handle for pipeline communication
//!
//! `SinkHandle` wraps a channel sender and sink identifier, allowing the
//! dispatcher to send batches to sinks without knowing their concrete
//! types.

use std::sync::Arc;

use readout_format::SealedBatch;
use tokio::sync::mpsc;

/// Index of one registered sink
///
/// A small integer used for O(1) sink lookup in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u16);

impl SinkId {
    #[inline]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for SinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sink:{}", self.0)
    }
}

/// Handle to a sink for sending batches
///
/// Each sink creates a channel during initialization and registers the
/// sending half with the dispatcher wrapped in a handle.
pub struct SinkHandle {
    /// Unique identifier for this sink (u16 index)
    id: SinkId,

    /// Human-readable name for debugging/metrics
    name: String,

    /// Channel sender for batches
    ///
    /// Uses `Arc<SealedBatch>` to allow zero-copy fan-out to multiple
    /// sinks.
    sender: mpsc::Sender<Arc<SealedBatch>>,
}

impl SinkHandle {
    #[inline]
    pub fn new(
        id: SinkId,
        name: impl Into<String>,
        sender: mpsc::Sender<Arc<SealedBatch>>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            sender,
        }
    }

    /// Get the sink's unique identifier
    #[inline]
    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Get the sink's name
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to send a batch without blocking
    ///
    /// Returns the batch back if the channel is full (backpressure) or
    /// closed.
    #[inline]
    pub fn try_send(&self, batch: Arc<SealedBatch>) -> Result<(), Arc<SealedBatch>> {
        self.sender.try_send(batch).map_err(|e| match e {
            mpsc::error::TrySendError::Full(b) => b,
            mpsc::error::TrySendError::Closed(b) => b,
        })
    }

    /// Send a batch, waiting if the channel is full
    ///
    /// Returns the batch back if the channel is closed.
    #[inline]
    pub async fn send(&self, batch: Arc<SealedBatch>) -> Result<(), Arc<SealedBatch>> {
        self.sender.send(batch).await.map_err(|e| e.0)
    }

    /// Check if the sink channel is closed
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Get the current capacity of the channel
    #[inline]
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}

impl std::fmt::Debug for SinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SinkHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}
