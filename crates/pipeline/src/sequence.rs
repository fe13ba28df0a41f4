//! Sequence tracking for per-digitizer batch streams
//!
//! Each producer stamps its batches with a monotonically increasing
//! sequence number. A consumer feeds the numbers it sees into a
//! `SequenceTracker` to surface datagram loss. Gaps are diagnosed, never
//! fatal: data keeps flowing with whatever arrives.

use std::collections::HashMap;

/// Outcome of observing one sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// Exactly the expected number
    InOrder,
    /// Jumped ahead; `missed` batches were never seen
    Gap { missed: u32 },
    /// Went backwards (reordered or duplicated datagram)
    OutOfOrder,
}

/// Tracks expected sequence numbers per digitizer
#[derive(Debug, Default)]
pub struct SequenceTracker {
    expected: HashMap<u32, u32>,
    gaps: u64,
    missed: u64,
    out_of_order: u64,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe one batch's sequence number
    ///
    /// The first number seen for a digitizer establishes its stream;
    /// mid-run attach is normal for a network consumer.
    pub fn observe(&mut self, digitizer_id: u32, seq_num: u32) -> SequenceStatus {
        let next = seq_num.wrapping_add(1);
        let expected = match self.expected.insert(digitizer_id, next) {
            None => return SequenceStatus::InOrder,
            Some(e) => e,
        };

        if seq_num == expected {
            SequenceStatus::InOrder
        } else if seq_num.wrapping_sub(expected) < u32::MAX / 2 {
            let missed = seq_num.wrapping_sub(expected);
            self.gaps += 1;
            self.missed += u64::from(missed);
            tracing::warn!(
                digitizer = digitizer_id,
                expected,
                received = seq_num,
                missed,
                "sequence gap: batches lost in transit"
            );
            SequenceStatus::Gap { missed }
        } else {
            self.out_of_order += 1;
            // Keep the furthest point we have seen as the expectation.
            self.expected.insert(digitizer_id, expected);
            tracing::warn!(
                digitizer = digitizer_id,
                expected,
                received = seq_num,
                "sequence went backwards (reordered or duplicate)"
            );
            SequenceStatus::OutOfOrder
        }
    }

    /// Number of gap events observed
    #[inline]
    pub fn gaps(&self) -> u64 {
        self.gaps
    }

    /// Total batches known to be missing
    #[inline]
    pub fn missed(&self) -> u64 {
        self.missed
    }

    /// Number of backwards observations
    #[inline]
    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    /// Digitizers with an established stream
    #[inline]
    pub fn stream_count(&self) -> usize {
        self.expected.len()
    }
}

#[cfg(test)]
#[path = "sequence_test.rs"]
mod sequence_test;
