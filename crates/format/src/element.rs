//! Element encodings
//!
//! One `Element` per detector event, in one of a closed set of shapes:
//! plain list-mode (`List422`, `List8222`), list-mode plus a waveform
//! tail, or the standard-firmware shape with an embedded waveform. The
//! set is deliberately a sum type built by explicit composition - the
//! kinds are finite and known, so no generic element family exists.
//!
//! Every encoding supports the same capability set: ordering by its
//! kind-specific key, exact serialized size, compound layout
//! description, fixed-width text rendering, and construction from a
//! hardware event.

use bytes::{Buf, BufMut};
use std::cmp::Ordering;
use std::fmt;

use crate::error::FormatError;
use crate::event::DigitizerEvent;
use crate::kind::ElementKind;
use crate::layout::CompoundLayout;
use crate::waveform::Waveform;
use crate::Result;

/// List-mode element: u32 time, u16 channel, u16 charge (8 bytes)
///
/// Ordered by `(time, channel)` ascending; downstream consumers rely on
/// this key when they sort a flushed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListElement422 {
    pub time: u32,
    pub channel: u16,
    pub charge: u16,
}

impl ListElement422 {
    /// Serialized size in bytes
    pub const SIZE: usize = 8;

    /// Build from a hardware event, resolving the channel through
    /// `group`
    pub fn from_event(event: &impl DigitizerEvent, group: u16) -> Self {
        Self {
            time: event.time_tag(),
            channel: event.channel(group),
            charge: event.charge(),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_ne(self.time);
        buf.put_u16_ne(self.channel);
        buf.put_u16_ne(self.charge);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(FormatError::too_short(Self::SIZE, buf.remaining()));
        }
        Ok(Self {
            time: buf.get_u32_ne(),
            channel: buf.get_u16_ne(),
            charge: buf.get_u16_ne(),
        })
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {:>10} {:>10}",
            self.channel, self.time, self.charge
        )
    }

    fn render_header(f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10} {:>10} {:>10}", "channel", "time", "charge")
    }
}

impl PartialOrd for ListElement422 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ListElement422 {
    /// `(time, channel)` key; charge does not participate
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.channel.cmp(&other.channel))
    }
}

/// Extended list-mode element: u64 time, u16 channel, u16 charge,
/// u16 baseline (14 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListElement8222 {
    pub time: u64,
    pub channel: u16,
    pub charge: u16,
    pub baseline: u16,
}

impl ListElement8222 {
    /// Serialized size in bytes
    pub const SIZE: usize = 14;

    pub fn from_event(event: &impl DigitizerEvent, group: u16) -> Self {
        Self {
            time: event.full_time(),
            channel: event.channel(group),
            charge: event.charge(),
            baseline: event.baseline(),
        }
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u64_ne(self.time);
        buf.put_u16_ne(self.channel);
        buf.put_u16_ne(self.charge);
        buf.put_u16_ne(self.baseline);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(FormatError::too_short(Self::SIZE, buf.remaining()));
        }
        Ok(Self {
            time: buf.get_u64_ne(),
            channel: buf.get_u16_ne(),
            charge: buf.get_u16_ne(),
            baseline: buf.get_u16_ne(),
        })
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {:>10} {:>10} {:>10}",
            self.channel, self.time, self.charge, self.baseline
        )
    }

    fn render_header(f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {:>10} {:>10} {:>10}",
            "channel", "time", "charge", "baseline"
        )
    }
}

impl PartialOrd for ListElement8222 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ListElement8222 {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.channel.cmp(&other.channel))
    }
}

/// Standard-firmware element: u32 time, u8 channel mask, u32 event
/// counter, embedded waveform (9 bytes + tail)
///
/// Ordered by time only; the channel mask covers several channels, so a
/// per-channel key makes no sense here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StandardElement {
    pub time: u32,
    pub channel_mask: u8,
    pub event_no: u32,
    pub waveform: Waveform,
}

impl StandardElement {
    /// Serialized size of the fixed part, before the waveform tail
    pub const FIXED_SIZE: usize = 9;

    pub fn from_event(event: &impl DigitizerEvent) -> Self {
        Self {
            time: event.time_tag(),
            channel_mask: event.channel_mask(),
            event_no: event.event_no(),
            waveform: Waveform::new(event.waveform_samples().to_vec()),
        }
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        Self::FIXED_SIZE + self.waveform.byte_size()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32_ne(self.time);
        buf.put_u8(self.channel_mask);
        buf.put_u32_ne(self.event_no);
        self.waveform.encode(buf);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < Self::FIXED_SIZE {
            return Err(FormatError::too_short(Self::FIXED_SIZE, buf.remaining()));
        }
        let time = buf.get_u32_ne();
        let channel_mask = buf.get_u8();
        let event_no = buf.get_u32_ne();
        let waveform = Waveform::decode(buf)?;
        Ok(Self {
            time,
            channel_mask,
            event_no,
            waveform,
        })
    }

    fn render(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10} {:>10} {:>10} ",
            self.channel_mask, self.time, self.event_no
        )?;
        self.waveform.render(f)
    }

    fn render_header(f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10} {:>10} {:>10} ", "channelMask", "time", "eventNo")?;
        Waveform::render_header(f)
    }
}

impl PartialOrd for StandardElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StandardElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time)
    }
}

/// `ListElement422` base followed by a waveform tail
///
/// Ordering delegates to the base element, as for all composed kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waveform422Element {
    pub base: ListElement422,
    pub waveform: Waveform,
}

impl Waveform422Element {
    pub fn from_event(event: &impl DigitizerEvent, group: u16) -> Self {
        Self {
            base: ListElement422::from_event(event, group),
            waveform: Waveform::new(event.waveform_samples().to_vec()),
        }
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        ListElement422::SIZE + self.waveform.byte_size()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        self.base.encode(buf);
        self.waveform.encode(buf);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self {
            base: ListElement422::decode(buf)?,
            waveform: Waveform::decode(buf)?,
        })
    }
}

impl PartialOrd for Waveform422Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waveform422Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base.cmp(&other.base)
    }
}

/// `ListElement8222` base followed by a waveform tail
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Waveform8222Element {
    pub base: ListElement8222,
    pub waveform: Waveform,
}

impl Waveform8222Element {
    pub fn from_event(event: &impl DigitizerEvent, group: u16) -> Self {
        Self {
            base: ListElement8222::from_event(event, group),
            waveform: Waveform::new(event.waveform_samples().to_vec()),
        }
    }

    #[inline]
    pub fn byte_size(&self) -> usize {
        ListElement8222::SIZE + self.waveform.byte_size()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        self.base.encode(buf);
        self.waveform.encode(buf);
    }

    pub fn decode(buf: &mut impl Buf) -> Result<Self> {
        Ok(Self {
            base: ListElement8222::decode(buf)?,
            waveform: Waveform::decode(buf)?,
        })
    }
}

impl PartialOrd for Waveform8222Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Waveform8222Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.base.cmp(&other.base)
    }
}

/// One encoded detector event, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Element {
    List422(ListElement422),
    List8222(ListElement8222),
    Standard(StandardElement),
    Waveform422(Waveform422Element),
    Waveform8222(Waveform8222Element),
}

impl Element {
    /// Build the element shape `kind` asks for from a hardware event
    ///
    /// `ElementKind::None` frames carry no elements and have no
    /// constructor; asking for one is a caller bug surfaced as
    /// `UnknownElementType`.
    pub fn from_event(
        kind: ElementKind,
        event: &impl DigitizerEvent,
        group: u16,
    ) -> Result<Self> {
        match kind {
            ElementKind::List422 => Ok(Self::List422(ListElement422::from_event(event, group))),
            ElementKind::List8222 => Ok(Self::List8222(ListElement8222::from_event(event, group))),
            ElementKind::Standard => Ok(Self::Standard(StandardElement::from_event(event))),
            ElementKind::Waveform422 => {
                Ok(Self::Waveform422(Waveform422Element::from_event(event, group)))
            }
            ElementKind::Waveform8222 => {
                Ok(Self::Waveform8222(Waveform8222Element::from_event(event, group)))
            }
            ElementKind::None => Err(FormatError::UnknownElementType(kind.as_u16())),
        }
    }

    /// The tag this element carries on the wire
    #[inline]
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::List422(_) => ElementKind::List422,
            Self::List8222(_) => ElementKind::List8222,
            Self::Standard(_) => ElementKind::Standard,
            Self::Waveform422(_) => ElementKind::Waveform422,
            Self::Waveform8222(_) => ElementKind::Waveform8222,
        }
    }

    /// Exact serialized size of this element instance
    ///
    /// For waveform-carrying shapes this depends on the sample count;
    /// batch byte totals must always go through here, never through a
    /// static per-kind size.
    #[inline]
    pub fn byte_size(&self) -> usize {
        match self {
            Self::List422(_) => ListElement422::SIZE,
            Self::List8222(_) => ListElement8222::SIZE,
            Self::Standard(e) => e.byte_size(),
            Self::Waveform422(e) => e.byte_size(),
            Self::Waveform8222(e) => e.byte_size(),
        }
    }

    /// Waveform sample count, zero for plain list-mode shapes
    #[inline]
    pub fn num_samples(&self) -> u16 {
        match self {
            Self::List422(_) | Self::List8222(_) => 0,
            Self::Standard(e) => e.waveform.num_samples(),
            Self::Waveform422(e) => e.waveform.num_samples(),
            Self::Waveform8222(e) => e.waveform.num_samples(),
        }
    }

    /// Compound layout describing this instance's serialized bytes
    pub fn layout(&self) -> CompoundLayout {
        CompoundLayout::for_kind(self.kind(), self.num_samples())
    }

    /// Encode this element's fields in wire order
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Self::List422(e) => e.encode(buf),
            Self::List8222(e) => e.encode(buf),
            Self::Standard(e) => e.encode(buf),
            Self::Waveform422(e) => e.encode(buf),
            Self::Waveform8222(e) => e.encode(buf),
        }
    }

    /// Decode one element of `kind` from the front of `buf`
    pub fn decode(kind: ElementKind, buf: &mut impl Buf) -> Result<Self> {
        match kind {
            ElementKind::List422 => Ok(Self::List422(ListElement422::decode(buf)?)),
            ElementKind::List8222 => Ok(Self::List8222(ListElement8222::decode(buf)?)),
            ElementKind::Standard => Ok(Self::Standard(StandardElement::decode(buf)?)),
            ElementKind::Waveform422 => Ok(Self::Waveform422(Waveform422Element::decode(buf)?)),
            ElementKind::Waveform8222 => Ok(Self::Waveform8222(Waveform8222Element::decode(buf)?)),
            ElementKind::None => Err(FormatError::UnknownElementType(kind.as_u16())),
        }
    }

    /// Total order over elements: kind tag first, then the kind-specific
    /// key
    ///
    /// Within one (homogeneous) batch this reduces to the per-kind
    /// comparison: `(time, channel)` for list shapes, time for standard.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::List422(a), Self::List422(b)) => a.cmp(b),
            (Self::List8222(a), Self::List8222(b)) => a.cmp(b),
            (Self::Standard(a), Self::Standard(b)) => a.cmp(b),
            (Self::Waveform422(a), Self::Waveform422(b)) => a.cmp(b),
            (Self::Waveform8222(a), Self::Waveform8222(b)) => a.cmp(b),
            (a, b) => a.kind().as_u16().cmp(&b.kind().as_u16()),
        }
    }
}

/// Fixed-width column rendering, one row per element
///
/// The column order matches `ColumnHeader` for the same kind; a test
/// keeps the two synchronized.
impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List422(e) => e.render(f),
            Self::List8222(e) => e.render(f),
            Self::Standard(e) => e.render(f),
            Self::Waveform422(e) => {
                e.base.render(f)?;
                write!(f, " ")?;
                e.waveform.render(f)
            }
            Self::Waveform8222(e) => {
                e.base.render(f)?;
                write!(f, " ")?;
                e.waveform.render(f)
            }
        }
    }
}

/// Column-name row matching `Element`'s rendering for one kind
pub struct ColumnHeader(pub ElementKind);

impl fmt::Display for ColumnHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            ElementKind::None => Ok(()),
            ElementKind::List422 => ListElement422::render_header(f),
            ElementKind::List8222 => ListElement8222::render_header(f),
            ElementKind::Standard => StandardElement::render_header(f),
            ElementKind::Waveform422 => {
                ListElement422::render_header(f)?;
                write!(f, " ")?;
                Waveform::render_header(f)
            }
            ElementKind::Waveform8222 => {
                ListElement8222::render_header(f)?;
                write!(f, " ")?;
                Waveform::render_header(f)
            }
        }
    }
}
