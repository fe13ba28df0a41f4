//! Simulated event source
//!
//! Stands in for digitizer hardware: a deterministic pseudo-random
//! pulser producing events with plausible time, channel, and charge
//! distributions. Seeded from the digitizer id, so a run is
//! reproducible without hardware attached.

use readout_format::{DigitizerEvent, ElementKind};

/// Channels addressed per channel group
pub const CHANNELS_PER_GROUP: u16 = 8;

/// Waveform length the pulser records for waveform-carrying kinds
pub const PULSER_SAMPLES: u16 = 32;

/// One simulated hardware event
#[derive(Debug, Clone)]
pub struct PulserEvent {
    time: u64,
    channel: u16,
    charge: u16,
    baseline: u16,
    event_no: u32,
    samples: Vec<u16>,
}

impl DigitizerEvent for PulserEvent {
    fn time_tag(&self) -> u32 {
        self.time as u32
    }

    fn full_time(&self) -> u64 {
        self.time
    }

    fn channel(&self, group: u16) -> u16 {
        group * CHANNELS_PER_GROUP + self.channel
    }

    fn charge(&self) -> u16 {
        self.charge
    }

    fn baseline(&self) -> u16 {
        self.baseline
    }

    fn event_no(&self) -> u32 {
        self.event_no
    }

    fn channel_mask(&self) -> u8 {
        1 << (self.channel % 8)
    }

    fn waveform_samples(&self) -> &[u16] {
        &self.samples
    }
}

/// Deterministic pseudo-random event generator for one digitizer
pub struct Pulser {
    digitizer_id: u32,
    samples: u16,
    time: u64,
    event_no: u32,
    state: u64,
}

impl Pulser {
    /// Create a pulser for a digitizer running the given element kind
    pub fn new(digitizer_id: u32, kind: ElementKind) -> Self {
        let records_waveform = kind.has_waveform() || kind == ElementKind::Standard;
        Self {
            digitizer_id,
            samples: if records_waveform { PULSER_SAMPLES } else { 0 },
            time: 0,
            event_no: 0,
            state: 0x9e37_79b9_7f4a_7c15 ^ u64::from(digitizer_id),
        }
    }

    /// Digitizer this pulser simulates
    pub fn digitizer_id(&self) -> u32 {
        self.digitizer_id
    }

    /// Generate the next event; event times are strictly increasing
    pub fn next_event(&mut self) -> PulserEvent {
        // Random trigger spacing, 1..=1024 ticks.
        self.time += 1 + (self.next_u64() & 0x3ff);
        self.event_no = self.event_no.wrapping_add(1);

        let channel = (self.next_u64() % u64::from(CHANNELS_PER_GROUP)) as u16;
        let baseline = 8000 + (self.next_u64() & 0xff) as u16;
        // Sum of uniforms gives a rough peak around 2048.
        let charge = ((self.next_u64() & 0xfff) + (self.next_u64() & 0xfff)) as u16 / 2;

        let mut samples = Vec::with_capacity(usize::from(self.samples));
        for i in 0..self.samples {
            // Baseline with a triangular pulse in the middle of the trace.
            let mid = i32::from(PULSER_SAMPLES / 2);
            let dip = (mid - (i32::from(i) - mid).abs()).max(0) as u16 * (charge / 64);
            let noise = (self.next_u64() & 0xf) as u16;
            samples.push(baseline + noise - dip.min(baseline));
        }

        PulserEvent {
            time: self.time,
            channel,
            charge,
            baseline,
            event_no: self.event_no,
            samples,
        }
    }

    // xorshift64
    fn next_u64(&mut self) -> u64 {
        let mut s = self.state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.state = s;
        s
    }
}

#[cfg(test)]
#[path = "pulser_test.rs"]
mod tests;
