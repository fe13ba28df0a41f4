//! Tests for the sink contract, metrics, and the drive loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use readout_format::{BatchMeta, Element, ElementKind, EventBuffer, ListElement422, SealedBatch};
use tokio::sync::mpsc;

use crate::common::{drive, EventSink, SinkError, SinkMetrics};

// =============================================================================
// Helpers
// =============================================================================

fn list_batch(digitizer_id: u32, seq_num: u32, count: u16) -> Arc<SealedBatch> {
    let mut buffer = EventBuffer::unbounded(ElementKind::List422);
    for i in 0..count {
        buffer
            .append(Element::List422(ListElement422 {
                time: u32::from(i) * 10,
                channel: i,
                charge: 400,
            }))
            .unwrap();
    }
    Arc::new(SealedBatch {
        meta: BatchMeta {
            run_id: 7,
            global_time: 1000,
            digitizer_id,
            seq_num,
        },
        buffer,
    })
}

/// Sink that rejects batches from one digitizer and records the rest
struct FlakySink {
    metrics: SinkMetrics,
    fail_digitizer: u32,
    accepted: Vec<u32>,
    closed: Arc<AtomicBool>,
}

impl FlakySink {
    fn new(fail_digitizer: u32) -> Self {
        Self {
            metrics: SinkMetrics::new(),
            fail_digitizer,
            accepted: Vec::new(),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl EventSink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(&mut self, meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError> {
        if meta.digitizer_id == self.fail_digitizer {
            return Err(SinkError::write("simulated failure"));
        }
        self.accepted.push(meta.seq_num);
        self.metrics
            .batch_written(buffer.len() as u64, buffer.byte_size() as u64);
        Ok(())
    }

    fn close(&mut self) -> Result<(), SinkError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// =============================================================================
// Metrics
// =============================================================================

#[test]
fn metrics_accumulate_and_snapshot() {
    let metrics = SinkMetrics::new();
    metrics.batch_received();
    metrics.batch_received();
    metrics.batch_written(3, 24);
    metrics.batch_written(2, 16);
    metrics.write_error();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.batches_received, 2);
    assert_eq!(snapshot.batches_written, 2);
    assert_eq!(snapshot.elements_written, 5);
    assert_eq!(snapshot.bytes_written, 40);
    assert_eq!(snapshot.write_errors, 1);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn error_constructors_and_display() {
    let err = SinkError::init("no such directory");
    assert!(err.to_string().contains("no such directory"));

    let err = SinkError::schema_mismatch(42, "sample count changed");
    assert!(err.to_string().contains("42"));
    assert!(err.to_string().contains("sample count changed"));

    let err = SinkError::PayloadTooLarge {
        size: 9000,
        budget: 8972,
    };
    assert!(err.to_string().contains("9000"));
    assert!(err.to_string().contains("8972"));
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err = SinkError::from(io);
    assert!(matches!(err, SinkError::Io(_)));
}

// =============================================================================
// Drive loop
// =============================================================================

#[tokio::test]
async fn drive_delivers_batches_in_order() {
    let (tx, rx) = mpsc::channel(8);
    let sink = FlakySink::new(u32::MAX);

    tx.send(list_batch(1, 0, 2)).await.unwrap();
    tx.send(list_batch(1, 1, 3)).await.unwrap();
    drop(tx);

    let snapshot = drive(sink, rx).await;
    assert_eq!(snapshot.batches_received, 2);
    assert_eq!(snapshot.batches_written, 2);
    assert_eq!(snapshot.elements_written, 5);
    assert_eq!(snapshot.write_errors, 0);
}

#[tokio::test]
async fn drive_counts_failures_without_stopping() {
    let (tx, rx) = mpsc::channel(8);
    let sink = FlakySink::new(2);

    tx.send(list_batch(1, 0, 1)).await.unwrap();
    tx.send(list_batch(2, 0, 1)).await.unwrap();
    tx.send(list_batch(1, 1, 1)).await.unwrap();
    drop(tx);

    let snapshot = drive(sink, rx).await;
    assert_eq!(snapshot.batches_received, 3);
    assert_eq!(snapshot.batches_written, 2);
    assert_eq!(snapshot.write_errors, 1);
}

#[tokio::test]
async fn drive_closes_sink_on_channel_end() {
    let (tx, rx) = mpsc::channel(8);
    let sink = FlakySink::new(u32::MAX);
    let closed = Arc::clone(&sink.closed);

    drop(tx);
    drive(sink, rx).await;
    assert!(closed.load(Ordering::SeqCst));
}
