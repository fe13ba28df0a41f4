//! Compound layout description
//!
//! Maps an element's serialized byte layout to a self-describing field
//! list (name, byte offset, primitive type) that a columnar storage
//! backend consumes to build its schema. Composite kinds concatenate
//! their parts' field lists, shifting the tail by the preceding part's
//! size: the description must mirror the real layout exactly, since a
//! mismatch corrupts stored data silently rather than crashing.

use crate::kind::ElementKind;
use crate::waveform::Waveform;

/// Primitive type of one described field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    U8,
    U16,
    U32,
    U64,
    /// Fixed-length run of u16 values (waveform sample runs)
    U16Array(u16),
}

impl FieldType {
    /// Serialized width of this field in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
            Self::U16Array(n) => n as usize * 2,
        }
    }

    /// Wire code used by the columnar schema block
    #[inline]
    pub const fn code(self) -> u8 {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 3,
            Self::U64 => 4,
            Self::U16Array(_) => 5,
        }
    }
}

/// One described field: name, byte offset, primitive type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLayout {
    pub name: &'static str,
    pub offset: usize,
    pub ty: FieldType,
}

impl FieldLayout {
    #[inline]
    pub const fn new(name: &'static str, offset: usize, ty: FieldType) -> Self {
        Self { name, offset, ty }
    }

    /// Byte width of this field
    #[inline]
    pub const fn width(&self) -> usize {
        self.ty.width()
    }
}

/// Complete field list plus aggregate byte size for one element kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundLayout {
    fields: Vec<FieldLayout>,
    byte_size: usize,
}

impl CompoundLayout {
    /// Build the layout for `kind`
    ///
    /// `samples` is the waveform sample count and is ignored for
    /// fixed-size kinds; callers know statically which form applies.
    pub fn for_kind(kind: ElementKind, samples: u16) -> Self {
        let mut fields = Vec::new();
        match kind {
            ElementKind::None => {}
            ElementKind::List422 => list422_fields(&mut fields, 0),
            ElementKind::List8222 => list8222_fields(&mut fields, 0),
            ElementKind::Standard => {
                fields.push(FieldLayout::new("time", 0, FieldType::U32));
                fields.push(FieldLayout::new("channelMask", 4, FieldType::U8));
                fields.push(FieldLayout::new("eventNo", 5, FieldType::U32));
                Waveform::layout_into(&mut fields, 9, samples);
            }
            ElementKind::Waveform422 => {
                list422_fields(&mut fields, 0);
                Waveform::layout_into(&mut fields, 8, samples);
            }
            ElementKind::Waveform8222 => {
                list8222_fields(&mut fields, 0);
                Waveform::layout_into(&mut fields, 14, samples);
            }
        }
        let byte_size = kind.size_with_samples(samples);
        Self { fields, byte_size }
    }

    /// The described fields, in offset order
    #[inline]
    pub fn fields(&self) -> &[FieldLayout] {
        &self.fields
    }

    /// Aggregate serialized size of one element under this layout
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

fn list422_fields(fields: &mut Vec<FieldLayout>, base: usize) {
    fields.push(FieldLayout::new("time", base, FieldType::U32));
    fields.push(FieldLayout::new("channel", base + 4, FieldType::U16));
    fields.push(FieldLayout::new("charge", base + 6, FieldType::U16));
}

fn list8222_fields(fields: &mut Vec<FieldLayout>, base: usize) {
    fields.push(FieldLayout::new("time", base, FieldType::U64));
    fields.push(FieldLayout::new("channel", base + 8, FieldType::U16));
    fields.push(FieldLayout::new("charge", base + 10, FieldType::U16));
    fields.push(FieldLayout::new("baseline", base + 12, FieldType::U16));
}
