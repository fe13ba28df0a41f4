//! Element kind tags
//!
//! All element encodings share one u16 tag space. Waveform-carrying
//! variants are not separately enumerated: they are the base kind with
//! `WAVEFORM_FLAG` set, so a consumer tests for waveforms with a single
//! bit test and recovers the base kind by masking.

use crate::waveform::Waveform;

/// High bit marking a waveform-carrying variant.
///
/// Must never collide with the base kind range, which stays below it.
pub const WAVEFORM_FLAG: u16 = 1 << 8;

/// Element encoding tag carried in every frame header
///
/// NOTE: These values are used on the wire and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ElementKind {
    /// Empty frame (no payload)
    None = 0,
    /// List-mode: u32 time, u16 channel, u16 charge
    List422 = 1,
    /// List-mode: u64 time, u16 channel, u16 charge, u16 baseline
    List8222 = 2,
    /// Standard (non-DPP) event with embedded waveform
    Standard = 3,
    /// `List422` followed by a waveform tail
    Waveform422 = WAVEFORM_FLAG | 1,
    /// `List8222` followed by a waveform tail
    Waveform8222 = WAVEFORM_FLAG | 2,
}

impl ElementKind {
    /// Parse a kind from its wire tag
    ///
    /// Returns `None` for a tag outside the known set; decode paths turn
    /// that into `FormatError::UnknownElementType`.
    #[inline]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::List422),
            2 => Some(Self::List8222),
            3 => Some(Self::Standard),
            v if v == WAVEFORM_FLAG | 1 => Some(Self::Waveform422),
            v if v == WAVEFORM_FLAG | 2 => Some(Self::Waveform8222),
            _ => None,
        }
    }

    /// Convert to the wire tag
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Check whether elements of this kind carry a waveform tail
    ///
    /// `Standard` embeds its waveform in the base layout and is tagged
    /// below the flag bit, but still has a variable size.
    #[inline]
    pub const fn has_waveform(self) -> bool {
        self.as_u16() & WAVEFORM_FLAG != 0
    }

    /// Recover the base kind by masking off the waveform flag
    #[inline]
    pub const fn base(self) -> Self {
        match self {
            Self::Waveform422 => Self::List422,
            Self::Waveform8222 => Self::List8222,
            other => other,
        }
    }

    /// The waveform-carrying variant of a list kind, if one exists
    #[inline]
    pub const fn with_waveform(self) -> Option<Self> {
        match self {
            Self::List422 => Some(Self::Waveform422),
            Self::List8222 => Some(Self::Waveform8222),
            _ => None,
        }
    }

    /// Check whether every element of this kind has the same byte size
    #[inline]
    pub const fn is_fixed_size(self) -> bool {
        matches!(self, Self::None | Self::List422 | Self::List8222)
    }

    /// Serialized size of a fixed-size kind
    ///
    /// Returns `None` for kinds whose size depends on a sample count;
    /// callers must use `size_with_samples` for those.
    #[inline]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::None => Some(0),
            Self::List422 => Some(8),
            Self::List8222 => Some(14),
            _ => None,
        }
    }

    /// Serialized size of an element of this kind with `samples` waveform
    /// samples
    ///
    /// For fixed-size kinds the sample count is ignored.
    #[inline]
    pub const fn size_with_samples(self, samples: u16) -> usize {
        match self {
            Self::None => 0,
            Self::List422 => 8,
            Self::List8222 => 14,
            Self::Standard => 9 + Waveform::size_with_samples(samples),
            Self::Waveform422 => 8 + Waveform::size_with_samples(samples),
            Self::Waveform8222 => 14 + Waveform::size_with_samples(samples),
        }
    }

    /// Get the string name of this kind
    #[inline]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::List422 => "list422",
            Self::List8222 => "list8222",
            Self::Standard => "standard",
            Self::Waveform422 => "waveform422",
            Self::Waveform8222 => "waveform8222",
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
