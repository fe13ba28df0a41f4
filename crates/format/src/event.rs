//! Hardware event accessor seam
//!
//! The digitizer driver hands the core raw events through this trait;
//! element constructors read timing, channel, charge and waveform data
//! from it and never mutate the source. This is the only point where
//! the format layer touches the hardware collaborator.

/// Accessors exposed by one raw detector-readout event
///
/// The extended accessors (`baseline`, `event_no`, `channel_mask`,
/// `waveform_samples`) default to empty values so drivers for plain
/// list-mode firmware only implement what the hardware provides.
pub trait DigitizerEvent {
    /// Coarse event time tag (32-bit counter domain)
    fn time_tag(&self) -> u32;

    /// Extended event time (64-bit, rollover-corrected)
    ///
    /// Defaults to the widened coarse tag for hardware without an
    /// extended-time field.
    fn full_time(&self) -> u64 {
        u64::from(self.time_tag())
    }

    /// Absolute channel number for the given channel group
    fn channel(&self, group: u16) -> u16;

    /// Integrated charge
    fn charge(&self) -> u16;

    /// Sampled baseline (extended list-mode firmware only)
    fn baseline(&self) -> u16 {
        0
    }

    /// Event counter (standard firmware only)
    fn event_no(&self) -> u32 {
        0
    }

    /// Bitmask of channels active in this event (standard firmware only)
    fn channel_mask(&self) -> u8 {
        0
    }

    /// Waveform samples recorded with this event, empty when the
    /// firmware ran without waveform recording
    fn waveform_samples(&self) -> &[u16] {
        &[]
    }
}
