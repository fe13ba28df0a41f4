//! Format error types
//!
//! Errors that can occur when encoding, decoding or buffering frames.

use thiserror::Error;

use crate::kind::ElementKind;

/// Errors that can occur during format operations
#[derive(Debug, Error)]
pub enum FormatError {
    /// Input is too short to contain the required fields
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },

    /// Header length is not the fixed header width
    #[error("bad header length: expected {expected} bytes, got {actual}")]
    BadHeaderLength { expected: usize, actual: usize },

    /// Header carries a version with an unsupported major component
    #[error("unsupported format version {found:#06x} (supported major {supported})")]
    VersionMismatch { found: u16, supported: u8 },

    /// Element type tag not in the known kind set
    #[error("unknown element type tag {0:#06x}")]
    UnknownElementType(u16),

    /// Element kind does not match the buffer it is being appended to
    #[error("element kind {found} does not match buffer kind {expected}")]
    KindMismatch {
        expected: ElementKind,
        found: ElementKind,
    },

    /// Appending would push the buffer past its byte budget
    #[error("byte budget exceeded: {current} + {element_bytes} > {budget}")]
    BudgetExceeded {
        current: usize,
        element_bytes: usize,
        budget: usize,
    },

    /// Frame payload ended before the declared element count was decoded
    #[error("truncated payload: element {index} of {count} needs {needed} more bytes")]
    Truncated {
        index: u16,
        count: u16,
        needed: usize,
    },

    /// Bytes left over after the declared element count was decoded
    #[error("{0} trailing bytes after last element")]
    TrailingBytes(usize),
}

impl FormatError {
    /// Create a too-short error
    #[inline]
    pub fn too_short(expected: usize, actual: usize) -> Self {
        Self::TooShort { expected, actual }
    }

    /// Create a version mismatch error for a rejected version word
    #[inline]
    pub fn version_mismatch(found: u16) -> Self {
        Self::VersionMismatch {
            found,
            supported: crate::VERSION_MAJOR,
        }
    }

    /// Create a budget-exceeded error
    #[inline]
    pub fn budget_exceeded(current: usize, element_bytes: usize, budget: usize) -> Self {
        Self::BudgetExceeded {
            current,
            element_bytes,
            budget,
        }
    }

    /// Check if this error is recoverable by the producer
    ///
    /// A budget overflow is handled by flushing and retrying the append;
    /// everything else poisons the frame it came from.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BudgetExceeded { .. })
    }
}
