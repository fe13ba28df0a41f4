//! Readout - Pipeline
//!
//! The async stage between the acquisition loop and the sinks.
//!
//! # Architecture
//!
//! ```text
//! [Acquisition]                [Dispatcher]                  [Sinks]
//!   Producer (per digitizer) ──→ mpsc::Receiver ──→ Arc<SealedBatch> ──→ text
//!   Producer ─────────────────┘       fan-out to every sink        └──→ udp
//! ```
//!
//! # Key Design
//!
//! - **Channel-based**: `tokio::sync::mpsc` between producer, dispatcher,
//!   and each sink
//! - **Arc fan-out**: one allocation per batch, shared by every sink
//! - **Backpressure**: `try_send` with overflow accounting, or blocking
//!   dispatch when delivery matters more than latency
//! - **Per-sink isolation**: a full or closed sink channel never stops
//!   delivery to the remaining sinks
//! - **Lossless producers**: a budget-full buffer is flushed and the
//!   event retried, never discarded
//!
//! # Example
//!
//! ```ignore
//! use readout_pipeline::{Dispatcher, Producer, ProducerConfig, SinkHandle, SinkId};
//! use tokio::sync::mpsc;
//!
//! let mut dispatcher = Dispatcher::new();
//! let (sink_tx, sink_rx) = mpsc::channel(1000);
//! dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "text", sink_tx));
//!
//! let (batch_tx, batch_rx) = mpsc::channel(1000);
//! tokio::spawn(dispatcher.run_blocking(batch_rx));
//!
//! let mut producer = Producer::new(config, batch_tx);
//! // acquisition loop: producer.push(&event, group).await?
//! // shutdown: producer.close().await?
//! ```

mod dispatcher;
mod error;
mod metrics;
mod producer;
mod sequence;
mod sink_handle;

pub use dispatcher::{Dispatcher, DispatcherMetricsHandle};
pub use error::{PipelineError, Result};
pub use metrics::{BackpressureTracker, DispatcherMetrics, MetricsSnapshot};
pub use producer::{Producer, ProducerConfig, ProducerStats};
pub use sequence::{SequenceStatus, SequenceTracker};
pub use sink_handle::{SinkHandle, SinkId};
