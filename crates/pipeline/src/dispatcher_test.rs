//! Tests for batch fan-out and per-sink isolation

use std::sync::Arc;

use readout_format::{BatchMeta, Element, ElementKind, EventBuffer, ListElement422, SealedBatch};
use readout_sinks::{drive, EventSink, NullSink, SinkError, SinkMetrics};
use tokio::sync::mpsc;

use crate::dispatcher::Dispatcher;
use crate::producer::{Producer, ProducerConfig};
use crate::sink_handle::{SinkHandle, SinkId};

// =============================================================================
// Helpers
// =============================================================================

fn batch(seq_num: u32, count: u16) -> SealedBatch {
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
    SealedBatch {
        meta: BatchMeta {
            run_id: 7,
            global_time: 1000,
            digitizer_id: 137,
            seq_num,
        },
        buffer,
    }
}

// =============================================================================
// Fan-out
// =============================================================================

#[tokio::test]
async fn batches_fan_out_to_every_sink() {
    let mut dispatcher = Dispatcher::new();
    let (tx_a, mut rx_a) = mpsc::channel(4);
    let (tx_b, mut rx_b) = mpsc::channel(4);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "a", tx_a));
    dispatcher.register_sink(SinkHandle::new(SinkId::new(1), "b", tx_b));
    assert_eq!(dispatcher.sink_count(), 2);

    assert_eq!(dispatcher.dispatch(batch(0, 3)), 2);

    // Both sinks share the same allocation.
    let a = rx_a.recv().await.unwrap();
    let b = rx_b.recv().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.meta.seq_num, 0);
    assert_eq!(a.buffer.len(), 3);

    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.batches_dispatched, 1);
    assert_eq!(snapshot.sink_sends_success, 2);
    assert_eq!(snapshot.elements_processed, 3);
}

#[tokio::test]
async fn no_sinks_means_dropped() {
    let dispatcher = Dispatcher::new();
    assert_eq!(dispatcher.dispatch(batch(0, 1)), 0);
    assert_eq!(dispatcher.metrics().snapshot().batches_dropped, 1);
}

#[test]
fn register_and_unregister() {
    let mut dispatcher = Dispatcher::new();
    let (tx, _rx) = mpsc::channel(4);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(3), "late", tx));

    assert!(dispatcher.has_sink(SinkId::new(3)));
    assert!(!dispatcher.has_sink(SinkId::new(0)));

    let handle = dispatcher.unregister_sink(SinkId::new(3)).unwrap();
    assert_eq!(handle.name(), "late");
    assert_eq!(dispatcher.sink_count(), 0);
}

// =============================================================================
// Per-sink isolation
// =============================================================================

#[tokio::test]
async fn full_sink_misses_a_batch_but_others_receive_it() {
    let mut dispatcher = Dispatcher::new();
    let (tx_slow, mut rx_slow) = mpsc::channel(1);
    let (tx_fast, mut rx_fast) = mpsc::channel(8);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "slow", tx_slow));
    dispatcher.register_sink(SinkHandle::new(SinkId::new(1), "fast", tx_fast));

    assert_eq!(dispatcher.dispatch(batch(0, 1)), 2);
    // The slow sink's channel is now full.
    assert_eq!(dispatcher.dispatch(batch(1, 1)), 1);

    let snapshot = dispatcher.metrics().snapshot();
    assert_eq!(snapshot.backpressure_events, 1);
    assert_eq!(snapshot.sink_sends_failed, 1);
    assert_eq!(snapshot.batches_dispatched, 2);

    assert_eq!(rx_slow.recv().await.unwrap().meta.seq_num, 0);
    assert_eq!(rx_fast.recv().await.unwrap().meta.seq_num, 0);
    assert_eq!(rx_fast.recv().await.unwrap().meta.seq_num, 1);
}

#[tokio::test]
async fn closed_sink_is_skipped() {
    let mut dispatcher = Dispatcher::new();
    let (tx_dead, rx_dead) = mpsc::channel(4);
    let (tx_live, mut rx_live) = mpsc::channel(4);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "dead", tx_dead));
    dispatcher.register_sink(SinkHandle::new(SinkId::new(1), "live", tx_live));
    drop(rx_dead);

    assert_eq!(dispatcher.dispatch(batch(0, 1)), 1);
    assert_eq!(rx_live.recv().await.unwrap().meta.seq_num, 0);
    assert_eq!(dispatcher.metrics().snapshot().sink_sends_failed, 1);
}

#[tokio::test]
async fn blocking_dispatch_waits_for_capacity() {
    let mut dispatcher = Dispatcher::new();
    let (tx, mut rx) = mpsc::channel(1);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "only", tx));

    assert_eq!(dispatcher.dispatch_blocking(batch(0, 1)).await, 1);

    // Drain concurrently so the second blocking send can proceed.
    let consumer = tokio::spawn(async move {
        let mut seqs = Vec::new();
        while let Some(b) = rx.recv().await {
            seqs.push(b.meta.seq_num);
        }
        seqs
    });

    assert_eq!(dispatcher.dispatch_blocking(batch(1, 1)).await, 1);
    drop(dispatcher);

    assert_eq!(consumer.await.unwrap(), [0, 1]);
}

// =============================================================================
// End-to-end: one failing sink never stops the healthy one
// =============================================================================

/// Sink whose writes always fail
struct BrokenSink {
    metrics: SinkMetrics,
}

impl EventSink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(
        &mut self,
        _meta: &BatchMeta,
        _buffer: &EventBuffer,
    ) -> Result<(), SinkError> {
        Err(SinkError::write("disk on fire"))
    }
}

#[tokio::test]
async fn failing_sink_does_not_stop_the_healthy_one() {
    let mut dispatcher = Dispatcher::new();

    let (tx_null, rx_null) = mpsc::channel(16);
    let (tx_broken, rx_broken) = mpsc::channel(16);
    dispatcher.register_sink(SinkHandle::new(SinkId::new(0), "null", tx_null));
    dispatcher.register_sink(SinkHandle::new(SinkId::new(1), "broken", tx_broken));

    let null_sink = NullSink::new("null");
    let null_handle = null_sink.metrics_handle();
    let null_task = tokio::spawn(drive(null_sink, rx_null));
    let broken_task = tokio::spawn(drive(
        BrokenSink {
            metrics: SinkMetrics::new(),
        },
        rx_broken,
    ));

    let (batch_tx, batch_rx) = mpsc::channel(16);
    let dispatcher_task = tokio::spawn(dispatcher.run_blocking(batch_rx));

    let mut producer = Producer::with_clock(
        ProducerConfig {
            run_id: 7,
            digitizer_id: 137,
            kind: ElementKind::List422,
            byte_budget: usize::MAX,
            max_elements: 2,
        },
        batch_tx,
        Box::new(|| 1000),
    );
    for i in 0..6u32 {
        producer
            .push_element(Element::List422(ListElement422 {
                time: i,
                channel: 0,
                charge: 1,
            }))
            .await
            .unwrap();
    }
    producer.close().await.unwrap();
    dispatcher_task.await.unwrap();

    let broken_snapshot = broken_task.await.unwrap();
    assert_eq!(broken_snapshot.batches_received, 3);
    assert_eq!(broken_snapshot.batches_written, 0);
    assert_eq!(broken_snapshot.write_errors, 3);

    let null_snapshot = null_task.await.unwrap();
    assert_eq!(null_snapshot.batches_received, 3);
    assert_eq!(null_snapshot.batches_written, 3);
    assert_eq!(null_snapshot.elements_written, 6);
    assert_eq!(null_handle.snapshot().batches_written, 3);
}
