//! Common types and utilities for sinks
//!
//! The `EventSink` trait is the contract every backend implements; the
//! `drive` loop runs one sink on its own channel so that a slow or
//! failing sink never stalls the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use readout_format::{BatchMeta, EventBuffer, FormatError, SealedBatch};
use thiserror::Error;
use tokio::sync::mpsc;

// =============================================================================
// Sink contract
// =============================================================================

/// Contract implemented by every batch destination
///
/// `accept` receives one sealed batch; the sink must not retain the
/// references past the call. A sink that reports a network byte budget
/// via `is_network` causes the producer feeding it to size buffers for
/// datagram delivery.
pub trait EventSink: Send {
    /// Stable name for logs and metrics
    fn name(&self) -> &str;

    /// Whether this sink transmits over a datagram transport
    ///
    /// Network sinks impose the payload-ceiling byte budget on the
    /// producer; storage sinks accept batches of any size.
    fn is_network(&self) -> bool {
        false
    }

    /// Shared metrics for this sink
    fn metrics(&self) -> &SinkMetrics;

    /// Handle one sealed batch
    ///
    /// An error marks this batch failed for this sink only; the
    /// dispatcher keeps feeding the remaining sinks.
    fn accept(&mut self, meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError>;

    /// Flush and release resources at end of run
    fn close(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Run one sink on its channel until the dispatcher drops the sender
///
/// Write failures are logged and counted, never propagated: one bad
/// batch (or one bad sink) does not take the acquisition down. Returns
/// the final metrics snapshot after `close`.
pub async fn drive<S: EventSink>(
    mut sink: S,
    mut receiver: mpsc::Receiver<Arc<SealedBatch>>,
) -> MetricsSnapshot {
    tracing::info!(sink = sink.name(), "sink starting");

    while let Some(batch) = receiver.recv().await {
        sink.metrics().batch_received();
        if let Err(err) = sink.accept(&batch.meta, &batch.buffer) {
            sink.metrics().write_error();
            tracing::warn!(
                sink = sink.name(),
                digitizer = batch.meta.digitizer_id,
                seq = batch.meta.seq_num,
                %err,
                "batch write failed"
            );
        }
    }

    if let Err(err) = sink.close() {
        sink.metrics().write_error();
        tracing::warn!(sink = sink.name(), %err, "sink close failed");
    }

    let snapshot = sink.metrics().snapshot();
    tracing::info!(
        sink = sink.name(),
        batches = snapshot.batches_written,
        elements = snapshot.elements_written,
        bytes = snapshot.bytes_written,
        errors = snapshot.write_errors,
        "sink shutting down"
    );
    snapshot
}

// =============================================================================
// Metrics
// =============================================================================

/// Metrics shared by all sink types
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total batches received
    pub batches_received: AtomicU64,

    /// Total batches successfully written
    pub batches_written: AtomicU64,

    /// Total elements written (sum of buffer lengths)
    pub elements_written: AtomicU64,

    /// Total bytes written
    pub bytes_written: AtomicU64,

    /// Write errors encountered
    pub write_errors: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub const fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            batches_written: AtomicU64::new(0),
            elements_written: AtomicU64::new(0),
            bytes_written: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
        }
    }

    /// Record a received batch
    #[inline]
    pub fn batch_received(&self) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successfully written batch
    #[inline]
    pub fn batch_written(&self, element_count: u64, bytes: u64) {
        self.batches_written.fetch_add(1, Ordering::Relaxed);
        self.elements_written
            .fetch_add(element_count, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a write error
    #[inline]
    pub fn write_error(&self) {
        self.write_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            batches_written: self.batches_written.load(Ordering::Relaxed),
            elements_written: self.elements_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of sink metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub batches_written: u64,
    pub elements_written: u64,
    pub bytes_written: u64,
    pub write_errors: u64,
}

/// Handle for reading a sink's metrics after `drive` consumed it
#[derive(Clone)]
pub struct SinkMetricsHandle {
    name: String,
    metrics: Arc<SinkMetrics>,
}

impl SinkMetricsHandle {
    pub fn new(name: impl Into<String>, metrics: Arc<SinkMetrics>) -> Self {
        Self {
            name: name.into(),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Common sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    /// Sink initialization failed
    #[error("failed to initialize sink: {0}")]
    Init(String),

    /// Failed to write data
    #[error("write failed: {0}")]
    Write(String),

    /// Encoded frame exceeds the datagram payload budget
    #[error("frame of {size} bytes exceeds datagram budget of {budget}")]
    PayloadTooLarge { size: usize, budget: usize },

    /// Batch does not match the schema already fixed for its stream
    #[error("schema mismatch for digitizer {digitizer_id}: {detail}")]
    SchemaMismatch { digitizer_id: u32, detail: String },

    /// Wire format error
    #[error(transparent)]
    Format(#[from] FormatError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Create an initialization error
    pub fn init(msg: impl Into<String>) -> Self {
        Self::Init(msg.into())
    }

    /// Create a write error
    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Create a schema mismatch error
    pub fn schema_mismatch(digitizer_id: u32, detail: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            digitizer_id,
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
#[path = "common_test.rs"]
mod common_test;
