//! Pipeline dispatcher metrics
//!
//! Atomic counters for tracking dispatch performance. All operations use
//! relaxed ordering; values are eventually consistent, not real-time.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the batch dispatcher
///
/// # Thread Safety
///
/// All methods are safe to call from multiple threads concurrently.
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Total batches received from producers
    batches_received: AtomicU64,

    /// Batches delivered to at least one sink
    batches_dispatched: AtomicU64,

    /// Batches delivered to no sink at all
    batches_dropped: AtomicU64,

    /// Individual sink sends that succeeded
    sink_sends_success: AtomicU64,

    /// Individual sink sends that failed (backpressure or closed)
    sink_sends_failed: AtomicU64,

    /// Times a sink channel was full (backpressure)
    backpressure_events: AtomicU64,

    /// Total elements processed (sum of buffer lengths)
    elements_processed: AtomicU64,

    /// Total element bytes processed
    bytes_processed: AtomicU64,
}

impl DispatcherMetrics {
    /// Create new metrics instance with all counters at zero
    #[inline]
    pub const fn new() -> Self {
        Self {
            batches_received: AtomicU64::new(0),
            batches_dispatched: AtomicU64::new(0),
            batches_dropped: AtomicU64::new(0),
            sink_sends_success: AtomicU64::new(0),
            sink_sends_failed: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
            elements_processed: AtomicU64::new(0),
            bytes_processed: AtomicU64::new(0),
        }
    }

    /// Record a batch received from a producer
    #[inline]
    pub fn record_received(&self, element_count: u64, byte_count: u64) {
        self.batches_received.fetch_add(1, Ordering::Relaxed);
        self.elements_processed
            .fetch_add(element_count, Ordering::Relaxed);
        self.bytes_processed
            .fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a batch delivered to at least one sink
    #[inline]
    pub fn record_dispatched(&self) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a batch that reached no sink
    #[inline]
    pub fn record_dropped(&self) {
        self.batches_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful send to a sink
    #[inline]
    pub fn record_sink_send_success(&self) {
        self.sink_sends_success.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed send to a sink
    #[inline]
    pub fn record_sink_send_failed(&self) {
        self.sink_sends_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backpressure event (sink channel full)
    #[inline]
    pub fn record_backpressure(&self) {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    #[inline]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            batches_received: self.batches_received.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            batches_dropped: self.batches_dropped.load(Ordering::Relaxed),
            sink_sends_success: self.sink_sends_success.load(Ordering::Relaxed),
            sink_sends_failed: self.sink_sends_failed.load(Ordering::Relaxed),
            backpressure_events: self.backpressure_events.load(Ordering::Relaxed),
            elements_processed: self.elements_processed.load(Ordering::Relaxed),
            bytes_processed: self.bytes_processed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of dispatcher metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub batches_received: u64,
    pub batches_dispatched: u64,
    pub batches_dropped: u64,
    pub sink_sends_success: u64,
    pub sink_sends_failed: u64,
    pub backpressure_events: u64,
    pub elements_processed: u64,
    pub bytes_processed: u64,
}

// ============================================================================
// Backpressure Tracker - Rate-limited logging for production visibility
// ============================================================================

/// Rate-limited backpressure logging
///
/// Aggregates drop events and logs a summary once a second instead of
/// per-event. During a beam spill a slow sink can reject thousands of
/// batches a second; the per-event log would drown everything else.
///
/// # Thresholds
///
/// - >0 drops/sec: WARN level
/// - >100 drops/sec: ERROR level (sink cannot keep up)
pub struct BackpressureTracker {
    /// Drops in current interval
    interval_drops: AtomicU64,
    /// Elements dropped in current interval
    interval_elements: AtomicU64,
    /// Last log time (epoch milliseconds)
    last_log_ms: AtomicU64,
}

/// Log interval in milliseconds
const LOG_INTERVAL_MS: u64 = 1000;
/// Drops/sec that escalates the summary to ERROR level
const CRITICAL_DROP_THRESHOLD: u64 = 100;

impl BackpressureTracker {
    pub fn new() -> Self {
        Self {
            interval_drops: AtomicU64::new(0),
            interval_elements: AtomicU64::new(0),
            last_log_ms: AtomicU64::new(Self::now_ms()),
        }
    }

    /// Record a drop event; returns true if a summary log was emitted
    pub fn record_drop(&self, element_count: u64) -> bool {
        self.interval_drops.fetch_add(1, Ordering::Relaxed);
        self.interval_elements
            .fetch_add(element_count, Ordering::Relaxed);

        self.maybe_log()
    }

    fn maybe_log(&self) -> bool {
        let now = Self::now_ms();
        let last = self.last_log_ms.load(Ordering::Relaxed);

        if now.saturating_sub(last) < LOG_INTERVAL_MS {
            return false;
        }

        // Claim the log slot so concurrent callers don't double-log.
        if self
            .last_log_ms
            .compare_exchange(last, now, Ordering::SeqCst, Ordering::Relaxed)
            .is_err()
        {
            return false;
        }

        let drops = self.interval_drops.swap(0, Ordering::Relaxed);
        let elements = self.interval_elements.swap(0, Ordering::Relaxed);

        if drops == 0 {
            return false;
        }

        if drops > CRITICAL_DROP_THRESHOLD {
            tracing::error!(
                dropped_batches = drops,
                dropped_elements = elements,
                threshold = CRITICAL_DROP_THRESHOLD,
                "CRITICAL: high backpressure - sinks cannot keep up"
            );
        } else {
            tracing::warn!(
                dropped_batches = drops,
                dropped_elements = elements,
                "backpressure: batches dropped in last second"
            );
        }

        true
    }

    #[inline]
    fn now_ms() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    /// Get the current drop count (for testing)
    #[cfg(test)]
    pub fn current_drops(&self) -> u64 {
        self.interval_drops.load(Ordering::Relaxed)
    }
}

impl Default for BackpressureTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackpressureTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackpressureTracker")
            .field(
                "interval_drops",
                &self.interval_drops.load(Ordering::Relaxed),
            )
            .field(
                "interval_elements",
                &self.interval_elements.load(Ordering::Relaxed),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backpressure_tracker_record_drop() {
        let tracker = BackpressureTracker::new();

        // Not enough time elapsed for a summary log yet.
        tracker.record_drop(10);
        tracker.record_drop(20);

        assert_eq!(tracker.current_drops(), 2);
    }

    #[test]
    fn test_record_received() {
        let metrics = DispatcherMetrics::new();

        metrics.record_received(100, 800);
        metrics.record_received(50, 400);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_received, 2);
        assert_eq!(snapshot.elements_processed, 150);
        assert_eq!(snapshot.bytes_processed, 1200);
    }

    #[test]
    fn test_record_sink_sends() {
        let metrics = DispatcherMetrics::new();

        metrics.record_sink_send_success();
        metrics.record_sink_send_success();
        metrics.record_sink_send_failed();
        metrics.record_backpressure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sink_sends_success, 2);
        assert_eq!(snapshot.sink_sends_failed, 1);
        assert_eq!(snapshot.backpressure_events, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(DispatcherMetrics::new());
        let mut handles = vec![];

        for _ in 0..4 {
            let m = Arc::clone(&metrics);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    m.record_received(1, 8);
                    m.record_dispatched();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_received, 4000);
        assert_eq!(snapshot.batches_dispatched, 4000);
        assert_eq!(snapshot.bytes_processed, 32000);
    }
}
