//! Waveform tail
//!
//! Variable-length run of ADC samples appended to waveform-carrying
//! elements. The tail is length-prefixed: a u16 sample count followed
//! by that many u16 samples, so a zero-sample waveform is legal and
//! occupies only the 2-byte head.

use bytes::{Buf, BufMut};
use std::fmt;

use crate::error::FormatError;
use crate::layout::{FieldLayout, FieldType};
use crate::Result;

/// Width of one waveform sample in bytes
pub const SAMPLE_WIDTH: usize = 2;

/// Fixed head of the tail (the u16 sample count)
pub const WAVEFORM_HEAD: usize = 2;

/// Variable-length waveform payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waveform {
    samples: Vec<u16>,
}

impl Waveform {
    /// Create a waveform from a sample vector
    ///
    /// At most `u16::MAX` samples are representable; longer inputs are
    /// truncated to that bound so the encoded count always matches the
    /// sample tail.
    #[inline]
    pub fn new(mut samples: Vec<u16>) -> Self {
        samples.truncate(u16::MAX as usize);
        Self { samples }
    }

    /// Number of samples in this waveform
    #[inline]
    pub fn num_samples(&self) -> u16 {
        self.samples.len() as u16
    }

    /// Sample values
    #[inline]
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    /// Serialized size of this waveform
    #[inline]
    pub fn byte_size(&self) -> usize {
        Self::size_with_samples(self.num_samples())
    }

    /// Serialized size of a waveform with `samples` samples
    ///
    /// `size_with_samples(n) == size_with_samples(0) + n * SAMPLE_WIDTH`
    /// for all n.
    #[inline]
    pub const fn size_with_samples(samples: u16) -> usize {
        WAVEFORM_HEAD + samples as usize * SAMPLE_WIDTH
    }

    /// Encode the sample count and samples
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u16_ne(self.num_samples());
        for &s in &self.samples {
            buf.put_u16_ne(s);
        }
    }

    /// Decode a waveform from the front of `buf`
    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < WAVEFORM_HEAD {
            return Err(FormatError::too_short(WAVEFORM_HEAD, buf.remaining()));
        }
        let count = buf.get_u16_ne() as usize;
        if buf.remaining() < count * SAMPLE_WIDTH {
            return Err(FormatError::too_short(
                count * SAMPLE_WIDTH,
                buf.remaining(),
            ));
        }
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(buf.get_u16_ne());
        }
        Ok(Self { samples })
    }

    /// Append this tail's field descriptions at `base_offset`
    ///
    /// Mirrors the serialized layout exactly: the count head, then the
    /// sample run as one array field.
    pub fn layout_into(fields: &mut Vec<FieldLayout>, base_offset: usize, samples: u16) {
        fields.push(FieldLayout::new("numSamples", base_offset, FieldType::U16));
        fields.push(FieldLayout::new(
            "samples",
            base_offset + WAVEFORM_HEAD,
            FieldType::U16Array(samples),
        ));
    }

    /// Write the column-name row for the waveform columns
    pub fn render_header(f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10} samples", "numSamples")
    }

    /// Write this waveform's columns, matching `render_header` order
    pub fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", self.num_samples())?;
        for s in &self.samples {
            write!(f, " {}", s)?;
        }
        Ok(())
    }
}
