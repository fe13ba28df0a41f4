//! Null sink - counts and discards all batches
//!
//! Used for benchmarking the pipeline without any I/O overhead, and for
//! exercising dispatch in tests. It records metrics and drops the batch.

use std::sync::Arc;

use readout_format::{BatchMeta, EventBuffer};

use crate::common::{EventSink, SinkError, SinkMetrics, SinkMetricsHandle};

/// Sink that discards every batch after counting it
pub struct NullSink {
    name: String,
    metrics: Arc<SinkMetrics>,
}

impl NullSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Metrics handle that stays valid after `drive` consumes the sink
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(self.name.clone(), Arc::clone(&self.metrics))
    }
}

impl EventSink for NullSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(&mut self, _meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError> {
        self.metrics
            .batch_written(buffer.len() as u64, buffer.byte_size() as u64);
        Ok(())
    }
}
