//! Dispatcher - async batch fan-out over channels
//!
//! The `Dispatcher` receives sealed batches from producers and delivers
//! each one to every registered sink. A batch is wrapped in `Arc` once
//! and shared; sinks never copy payload bytes.

use std::sync::Arc;

use readout_format::SealedBatch;
use tokio::sync::mpsc;

use crate::metrics::{BackpressureTracker, DispatcherMetrics, MetricsSnapshot};
use crate::sink_handle::{SinkHandle, SinkId};

/// Async dispatcher that fans batches out to every sink
///
/// # Design
///
/// - Receives `SealedBatch` from producers via an input channel
/// - Wraps each batch in `Arc` for zero-copy fan-out
/// - Uses `Vec<Option<SinkHandle>>` indexed by `SinkId` for O(1) lookup
/// - `dispatch` uses `try_send` and accounts overflow as backpressure;
///   `dispatch_blocking` waits for capacity instead
/// - A full or closed sink never prevents delivery to the others
pub struct Dispatcher {
    /// Registered sink handles indexed by SinkId
    /// Uses Option to allow sparse registration
    sinks: Vec<Option<SinkHandle>>,

    /// Dispatcher metrics (Arc for sharing with the metrics handle)
    metrics: Arc<DispatcherMetrics>,

    /// Rate-limited backpressure logging
    backpressure_tracker: BackpressureTracker,
}

/// Handle for accessing dispatcher metrics externally
///
/// Remains valid after the dispatcher is consumed by `run`.
#[derive(Clone)]
pub struct DispatcherMetricsHandle {
    metrics: Arc<DispatcherMetrics>,
}

impl DispatcherMetricsHandle {
    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no sinks registered
    pub fn new() -> Self {
        Self {
            sinks: Vec::new(),
            metrics: Arc::new(DispatcherMetrics::new()),
            backpressure_tracker: BackpressureTracker::new(),
        }
    }

    /// Get a metrics handle that survives `run` consuming the dispatcher
    pub fn metrics_handle(&self) -> DispatcherMetricsHandle {
        DispatcherMetricsHandle {
            metrics: Arc::clone(&self.metrics),
        }
    }

    /// Register a sink with the dispatcher
    ///
    /// The sink's `SinkId` determines its position in the internal
    /// array; the array grows as needed.
    pub fn register_sink(&mut self, handle: SinkHandle) {
        let index = handle.id().as_usize();

        if index >= self.sinks.len() {
            self.sinks.resize_with(index + 1, || None);
        }

        tracing::debug!(
            sink_id = %handle.id(),
            sink_name = %handle.name(),
            "registered sink with dispatcher"
        );

        self.sinks[index] = Some(handle);
    }

    /// Unregister a sink, returning its handle if it was registered
    pub fn unregister_sink(&mut self, id: SinkId) -> Option<SinkHandle> {
        let index = id.as_usize();
        if index < self.sinks.len() {
            self.sinks[index].take()
        } else {
            None
        }
    }

    /// Check if a sink is registered
    #[inline]
    pub fn has_sink(&self, id: SinkId) -> bool {
        let index = id.as_usize();
        index < self.sinks.len() && self.sinks[index].is_some()
    }

    /// Get the number of registered sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.iter().filter(|s| s.is_some()).count()
    }

    /// Get the current dispatcher metrics
    #[inline]
    pub fn metrics(&self) -> &DispatcherMetrics {
        &self.metrics
    }

    /// Deliver one batch to every registered sink without blocking
    ///
    /// A sink whose channel is full or closed misses this batch; the
    /// remaining sinks still receive it. Returns the number of sinks the
    /// batch reached.
    pub fn dispatch(&self, batch: SealedBatch) -> usize {
        self.metrics
            .record_received(batch.buffer.len() as u64, batch.buffer.byte_size() as u64);

        if self.sinks.iter().all(Option::is_none) {
            tracing::trace!(
                digitizer = batch.meta.digitizer_id,
                "no sinks registered, dropping batch"
            );
            self.metrics.record_dropped();
            return 0;
        }

        // The only allocation on the fan-out path.
        let element_count = batch.buffer.len() as u64;
        let batch = Arc::new(batch);

        let mut success_count = 0;

        for handle in self.sinks.iter().flatten() {
            if handle.is_closed() {
                tracing::warn!(
                    sink_id = %handle.id(),
                    sink_name = %handle.name(),
                    "sink channel closed, skipping"
                );
                self.metrics.record_sink_send_failed();
                continue;
            }

            match handle.try_send(Arc::clone(&batch)) {
                Ok(()) => {
                    self.metrics.record_sink_send_success();
                    success_count += 1;
                }
                Err(_) => {
                    // Channel full - backpressure
                    self.metrics.record_backpressure();
                    self.metrics.record_sink_send_failed();
                    self.backpressure_tracker.record_drop(element_count);

                    tracing::debug!(
                        sink_id = %handle.id(),
                        sink_name = %handle.name(),
                        capacity = handle.capacity(),
                        "sink channel full (backpressure)"
                    );
                }
            }
        }

        if success_count > 0 {
            self.metrics.record_dispatched();
        } else {
            self.metrics.record_dropped();
            tracing::warn!(
                digitizer = batch.meta.digitizer_id,
                seq = batch.meta.seq_num,
                "batch dropped: all sink sends failed"
            );
        }

        success_count
    }

    /// Deliver one batch, waiting for channel capacity
    ///
    /// Use this when delivery matters more than latency: detector data
    /// is not reproducible, so the acquisition path prefers to stall
    /// rather than drop. Closed sinks are still skipped.
    pub async fn dispatch_blocking(&self, batch: SealedBatch) -> usize {
        self.metrics
            .record_received(batch.buffer.len() as u64, batch.buffer.byte_size() as u64);

        if self.sinks.iter().all(Option::is_none) {
            self.metrics.record_dropped();
            return 0;
        }

        let batch = Arc::new(batch);
        let mut success_count = 0;

        for handle in self.sinks.iter().flatten() {
            if handle.is_closed() {
                self.metrics.record_sink_send_failed();
                continue;
            }

            match handle.send(Arc::clone(&batch)).await {
                Ok(()) => {
                    self.metrics.record_sink_send_success();
                    success_count += 1;
                }
                Err(_) => {
                    // Channel closed between the check and the send
                    self.metrics.record_sink_send_failed();
                }
            }
        }

        if success_count > 0 {
            self.metrics.record_dispatched();
        } else {
            self.metrics.record_dropped();
        }

        success_count
    }

    /// Run the dispatcher with non-blocking sends until the producers
    /// drop their senders
    pub async fn run(self, mut receiver: mpsc::Receiver<SealedBatch>) {
        tracing::info!(sink_count = self.sink_count(), "dispatcher starting");

        while let Some(batch) = receiver.recv().await {
            self.dispatch(batch);
        }

        self.log_final();
    }

    /// Run the dispatcher with blocking sends for guaranteed delivery
    pub async fn run_blocking(self, mut receiver: mpsc::Receiver<SealedBatch>) {
        tracing::info!(
            sink_count = self.sink_count(),
            "dispatcher starting (blocking mode)"
        );

        while let Some(batch) = receiver.recv().await {
            self.dispatch_blocking(batch).await;
        }

        self.log_final();
    }

    fn log_final(&self) {
        let snapshot = self.metrics.snapshot();
        tracing::info!(
            batches_received = snapshot.batches_received,
            batches_dispatched = snapshot.batches_dispatched,
            batches_dropped = snapshot.batches_dropped,
            sink_sends_success = snapshot.sink_sends_success,
            sink_sends_failed = snapshot.sink_sends_failed,
            backpressure_events = snapshot.backpressure_events,
            elements_processed = snapshot.elements_processed,
            bytes_processed = snapshot.bytes_processed,
            "dispatcher shutting down"
        );
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("sink_count", &self.sink_count())
            .finish()
    }
}

#[cfg(test)]
#[path = "dispatcher_test.rs"]
mod dispatcher_test;
