//! Readout - Sinks
//!
//! Storage and transport backends for sealed digitizer batches.
//!
//! # Architecture
//!
//! Each sink receives `Arc<SealedBatch>` instances via a tokio channel and
//! writes to its destination. Sinks never see partially filled buffers:
//! a batch is sealed by the producer before it is dispatched, and nothing
//! mutates it afterwards.
//!
//! ```text
//! [Dispatcher] --Arc<SealedBatch>--> [Sink Channel] --> [Sink Task] --> [Destination]
//! ```
//!
//! # Available Sinks
//!
//! | Sink | Purpose | Network budget |
//! |------|---------|----------------|
//! | `null` | Benchmarking (count and discard) | No |
//! | `text` | Human-readable per-run text files | No |
//! | `udp` | One datagram per batch frame | Yes |
//! | `columnar` | Self-describing columnar files, optional LZ4 | No |
//!
//! # Example
//!
//! ```ignore
//! use readout_sinks::null::NullSink;
//! use readout_sinks::drive;
//! use tokio::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel(1000);
//! let sink = NullSink::new("null");
//!
//! // Register tx with the dispatcher, then run the sink task.
//! tokio::spawn(drive(sink, rx));
//! ```

// =============================================================================
// Sink implementations (each in its own submodule)
// =============================================================================

/// Null sink - counts and discards (for benchmarking)
pub mod null;

/// Text sink - human-readable per-run files
pub mod text;

/// UDP sink - one datagram per sealed batch
pub mod udp;

/// Columnar sink - self-describing binary columns, optional LZ4
pub mod columnar;

/// Common types shared by all sinks (trait, errors, metrics, drive loop)
mod common;

// =============================================================================
// Public re-exports
// =============================================================================

pub use common::{drive, EventSink, MetricsSnapshot, SinkError, SinkMetrics, SinkMetricsHandle};

pub use columnar::{ColumnarConfig, ColumnarReader, ColumnarSink, SchemaBlock};
pub use null::NullSink;
pub use text::TextSink;
pub use udp::UdpSink;

// Tests are registered in their respective modules via #[cfg(test)]
// See: common.rs, text/mod.rs, udp/mod.rs, columnar/mod.rs, null/mod.rs
