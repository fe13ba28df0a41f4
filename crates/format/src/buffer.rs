//! Event buffer - one flush unit of homogeneous elements
//!
//! The producer owns and appends to an `EventBuffer` until a flush
//! boundary, then seals it into a `SealedBatch` and hands it to the
//! dispatcher; after hand-off nothing mutates it. The byte budget is
//! configuration, not policy: network producers pass the datagram
//! budget, storage-only producers pass an effectively unbounded one.

use crate::element::Element;
use crate::error::FormatError;
use crate::kind::ElementKind;
use crate::{Result, IP_HEADER_BYTES, UDP_HEADER_BYTES};

/// Element-byte budget available under a datagram payload ceiling
///
/// `ceiling - ip(20) - udp(8)`; the 32-byte frame header still has to
/// fit inside this, so producers feeding a network sink subtract
/// `Header::SIZE` as well.
#[inline]
pub const fn net_payload_budget(payload_ceiling: usize) -> usize {
    payload_ceiling - IP_HEADER_BYTES - UDP_HEADER_BYTES
}

/// Metadata travelling with one sealed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchMeta {
    /// Acquisition run
    pub run_id: u64,
    /// Flush timestamp assigned by the producer
    pub global_time: u64,
    /// Originating hardware unit
    pub digitizer_id: u32,
    /// Monotonic per digitizer
    pub seq_num: u32,
}

/// A sealed batch on its way to the sinks
///
/// Wrapped in `Arc` by the dispatcher for zero-copy fan-out.
#[derive(Debug, Clone)]
pub struct SealedBatch {
    pub meta: BatchMeta,
    pub buffer: EventBuffer,
}

/// Ordered, homogeneous, byte-budgeted collection of elements
///
/// Iteration is in append order; sorting, when a consumer wants the
/// per-kind key order, is that consumer's concern.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    kind: ElementKind,
    elements: Vec<Element>,
    byte_size: usize,
    budget: usize,
}

impl EventBuffer {
    /// Create an empty buffer for one element kind under `budget`
    /// element bytes
    pub fn new(kind: ElementKind, budget: usize) -> Self {
        Self {
            kind,
            elements: Vec::new(),
            byte_size: 0,
            budget,
        }
    }

    /// Create a buffer with no effective byte budget (storage sinks)
    pub fn unbounded(kind: ElementKind) -> Self {
        Self::new(kind, usize::MAX)
    }

    /// Append an element
    ///
    /// Fails with `KindMismatch` if the element is not this buffer's
    /// kind, and with `BudgetExceeded` if appending would push the byte
    /// total past the budget. On failure the buffer is unchanged; the
    /// producer reacts to a budget failure by flushing and retrying, so
    /// no event is ever dropped here.
    pub fn append(&mut self, element: Element) -> Result<()> {
        if element.kind() != self.kind {
            return Err(FormatError::KindMismatch {
                expected: self.kind,
                found: element.kind(),
            });
        }
        let element_bytes = element.byte_size();
        if self.byte_size + element_bytes > self.budget {
            return Err(FormatError::budget_exceeded(
                self.byte_size,
                element_bytes,
                self.budget,
            ));
        }
        self.byte_size += element_bytes;
        self.elements.push(element);
        Ok(())
    }

    /// Element kind this buffer holds
    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Configured element-byte budget
    #[inline]
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Current element bytes (excludes the frame header)
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Check if the buffer holds no elements
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Iterate elements in append order
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    /// Seal this buffer, replacing it with a fresh empty one
    ///
    /// The producer calls this at a flush boundary; the returned buffer
    /// is handed off and never touched by the producer again.
    pub fn take(&mut self) -> EventBuffer {
        let fresh = EventBuffer::new(self.kind, self.budget);
        std::mem::replace(self, fresh)
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}
