//! Frame header
//!
//! Fixed 32-byte preamble describing one flushed batch. Encode and
//! decode are explicit fixed-width field routines - the wire bytes
//! never depend on the compiler's idea of struct layout. Decoding is
//! gated on the version word: an unrecognized major is rejected
//! outright, never best-effort parsed.

use bytes::BufMut;

use crate::error::FormatError;
use crate::kind::ElementKind;
use crate::{version_major, BatchMeta, Result, CURRENT_VERSION, VERSION_MAJOR};

/// Fixed-size metadata preamble for one batch
///
/// Total size is pinned at 32 bytes; revisions must fit the reserved
/// tail (currently 2 pad bytes) or bump the major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Acquisition run, immutable for the run's lifetime
    pub run_id: u64,
    /// Flush timestamp, assigned by the producer
    pub global_time: u64,
    /// Originating hardware unit
    pub digitizer_id: u32,
    /// Encoding of every element in the batch
    pub element_type: ElementKind,
    /// Elements in the batch
    pub num_elements: u16,
    /// Format version, `(minor << 8) | major`
    pub version: u16,
    /// Monotonic per digitizer; the only gap-detection mechanism
    pub seq_num: u32,
}

impl Header {
    /// Serialized size in bytes, including reserved padding
    pub const SIZE: usize = 32;

    /// Build a header for a sealed batch
    pub fn for_batch(meta: &BatchMeta, element_type: ElementKind, num_elements: u16) -> Self {
        Self {
            run_id: meta.run_id,
            global_time: meta.global_time,
            digitizer_id: meta.digitizer_id,
            element_type,
            num_elements,
            version: CURRENT_VERSION,
            seq_num: meta.seq_num,
        }
    }

    /// Encode to the fixed 32-byte wire form
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        let mut buf = &mut bytes[..];
        buf.put_u64_ne(self.run_id);
        buf.put_u64_ne(self.global_time);
        buf.put_u32_ne(self.digitizer_id);
        buf.put_u16_ne(self.element_type.as_u16());
        buf.put_u16_ne(self.num_elements);
        buf.put_u16_ne(self.version);
        buf.put_u32_ne(self.seq_num);
        // remaining 2 bytes stay zero (reserved)
        bytes
    }

    /// Decode a header from exactly `SIZE` bytes
    ///
    /// Fails on wrong input length, on a version whose major component
    /// differs from ours, and on an element type outside the known tag
    /// set. All parsing decisions downstream key off `version` and
    /// `element_type`; nothing inspects the payload to guess.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::SIZE {
            return Err(FormatError::BadHeaderLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }

        let version = u16::from_ne_bytes([bytes[24], bytes[25]]);
        if version_major(version) != VERSION_MAJOR {
            return Err(FormatError::version_mismatch(version));
        }

        let raw_type = u16::from_ne_bytes([bytes[20], bytes[21]]);
        let element_type =
            ElementKind::from_u16(raw_type).ok_or(FormatError::UnknownElementType(raw_type))?;

        Ok(Self {
            run_id: u64::from_ne_bytes(bytes[0..8].try_into().expect("8-byte slice")),
            global_time: u64::from_ne_bytes(bytes[8..16].try_into().expect("8-byte slice")),
            digitizer_id: u32::from_ne_bytes(bytes[16..20].try_into().expect("4-byte slice")),
            element_type,
            num_elements: u16::from_ne_bytes([bytes[22], bytes[23]]),
            version,
            seq_num: u32::from_ne_bytes(bytes[26..30].try_into().expect("4-byte slice")),
        })
    }
}
