//! Readout Format - Binary data model for digitizer readout streams
//!
//! This crate provides the types every batch of detector events passes
//! through on its way from the acquisition loop to a sink:
//! - `Header` - fixed 32-byte frame preamble
//! - `Element` - one encoded detector event (list-mode or waveform)
//! - `ElementKind` - the u16 tag space shared by all encodings
//! - `EventBuffer` - one flush unit of homogeneous elements, byte-budgeted
//! - `CompoundLayout` - self-describing field/offset/type list for
//!   columnar storage backends
//!
//! # Design Principles
//!
//! - **Explicit wire layout**: every field is encoded and decoded with
//!   fixed-width routines; nothing relies on in-memory struct layout.
//! - **Closed kind set**: the element encodings form a small sum type,
//!   composed explicitly, not an open generic family.
//! - **One tag space**: waveform-carrying variants are `WAVEFORM_FLAG |
//!   base`, so "does this batch carry waveforms" is one bit test.
//!
//! Both producer and consumer are assumed to share byte order; all
//! multi-byte fields are written in native order.

mod buffer;
mod element;
mod error;
mod event;
mod frame;
mod header;
mod kind;
mod layout;
mod waveform;

pub use buffer::{net_payload_budget, BatchMeta, EventBuffer, SealedBatch};
pub use element::{
    ColumnHeader, Element, ListElement422, ListElement8222, StandardElement, Waveform422Element,
    Waveform8222Element,
};
pub use error::FormatError;
pub use event::DigitizerEvent;
pub use frame::{decode_frame, encode_frame};
pub use header::Header;
pub use kind::{ElementKind, WAVEFORM_FLAG};
pub use layout::{CompoundLayout, FieldLayout, FieldType};
pub use waveform::Waveform;

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

/// Result type for format operations
pub type Result<T> = std::result::Result<T, FormatError>;

/// Format version, major component. A consumer rejects any frame whose
/// major differs from its own.
pub const VERSION_MAJOR: u8 = 1;

/// Format version, minor component. Minor bumps are decode-compatible.
pub const VERSION_MINOR: u8 = 3;

/// Version word as carried in every frame header.
///
/// Stored as `(minor << 8) | major` for compatibility with readers of
/// the very first format revision; the arrangement is preserved
/// bit-for-bit and only the low (major) byte gates decoding.
pub const CURRENT_VERSION: u16 = ((VERSION_MINOR as u16) << 8) | VERSION_MAJOR as u16;

/// Extract the major component from a version word.
#[inline]
pub const fn version_major(version: u16) -> u8 {
    (version & 0xFF) as u8
}

/// Extract the minor component from a version word.
#[inline]
pub const fn version_minor(version: u16) -> u8 {
    (version >> 8) as u8
}

/// Default datagram payload ceiling in bytes (jumbo frame).
pub const DEFAULT_PAYLOAD_CEILING: usize = 9000;

/// IPv4 header overhead subtracted from the payload ceiling.
pub const IP_HEADER_BYTES: usize = 20;

/// UDP header overhead subtracted from the payload ceiling.
pub const UDP_HEADER_BYTES: usize = 8;

/// Default data port for the network sink.
pub const DEFAULT_DATA_PORT: u16 = 12345;

// Test modules - only compiled during testing
#[cfg(test)]
mod buffer_test;
