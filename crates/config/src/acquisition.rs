//! Acquisition configuration
//!
//! Run-level settings plus one entry per digitizer. The element kind a
//! digitizer produces is fixed for a run, so it lives here rather than
//! on the wire.

use readout_format::{ElementKind, DEFAULT_PAYLOAD_CEILING};
use serde::Deserialize;
use std::time::Duration;

/// Element kind a digitizer is configured to produce
///
/// Mirrors the wire tag space minus `none`, which is not a valid
/// acquisition mode.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// 8-byte list events (default)
    #[default]
    List422,
    /// 14-byte list events with baseline
    List8222,
    /// Standard events with waveform
    Standard,
    /// List422 events with waveform tail
    Waveform422,
    /// List8222 events with waveform tail
    Waveform8222,
}

impl EventKind {
    /// The wire-level element kind for this acquisition mode
    pub fn element_kind(self) -> ElementKind {
        match self {
            Self::List422 => ElementKind::List422,
            Self::List8222 => ElementKind::List8222,
            Self::Standard => ElementKind::Standard,
            Self::Waveform422 => ElementKind::Waveform422,
            Self::Waveform8222 => ElementKind::Waveform8222,
        }
    }
}

/// Configuration for one digitizer
///
/// # Example
///
/// ```toml
/// [[acquisition.digitizers]]
/// id = 137
/// kind = "list422"
/// channel_groups = 2
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigitizerConfig {
    /// Digitizer identifier, carried in every frame header
    pub id: u32,

    /// Element kind this digitizer produces
    /// Default: list422
    pub kind: EventKind,

    /// Number of channel groups (channel numbers are offset per group)
    /// Default: 1
    pub channel_groups: u16,

    /// Whether this digitizer participates in the run
    /// Default: true
    pub enabled: bool,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            id: 0,
            kind: EventKind::List422,
            channel_groups: 1,
            enabled: true,
        }
    }
}

/// Acquisition configuration
///
/// # Example
///
/// ```toml
/// [acquisition]
/// run_id = 42
/// flush_interval = "500ms"
/// payload_ceiling = 9000
/// max_elements = 1024
///
/// [[acquisition.digitizers]]
/// id = 137
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Run identifier; when absent the daemon derives one from the clock
    pub run_id: Option<u64>,

    /// Maximum time a partially filled batch waits before flushing
    /// Default: 500ms
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,

    /// Datagram payload ceiling in bytes; IP and UDP header overhead is
    /// subtracted to get the usable budget
    /// Default: 9000 (jumbo frame)
    pub payload_ceiling: usize,

    /// Batch element count ceiling; a batch flushes when it reaches
    /// this many elements even with budget to spare
    /// Default: 1024
    pub max_elements: u16,

    /// Digitizers participating in the run
    pub digitizers: Vec<DigitizerConfig>,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            run_id: None,
            flush_interval: Duration::from_millis(500),
            payload_ceiling: DEFAULT_PAYLOAD_CEILING,
            max_elements: 1024,
            digitizers: Vec::new(),
        }
    }
}

impl AcquisitionConfig {
    /// Iterate over the enabled digitizers
    pub fn enabled_digitizers(&self) -> impl Iterator<Item = &DigitizerConfig> {
        self.digitizers.iter().filter(|d| d.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AcquisitionConfig::default();
        assert_eq!(config.run_id, None);
        assert_eq!(config.flush_interval, Duration::from_millis(500));
        assert_eq!(config.payload_ceiling, 9000);
        assert_eq!(config.max_elements, 1024);
        assert!(config.digitizers.is_empty());
    }

    #[test]
    fn test_deserialize_digitizers() {
        let toml = r#"
run_id = 42
flush_interval = "250ms"

[[digitizers]]
id = 137
kind = "waveform422"
channel_groups = 2

[[digitizers]]
id = 740
enabled = false
"#;
        let config: AcquisitionConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.run_id, Some(42));
        assert_eq!(config.flush_interval, Duration::from_millis(250));
        assert_eq!(config.digitizers.len(), 2);
        assert_eq!(config.digitizers[0].id, 137);
        assert_eq!(config.digitizers[0].kind, EventKind::Waveform422);
        assert_eq!(config.digitizers[0].channel_groups, 2);
        assert!(!config.digitizers[1].enabled);
        assert_eq!(config.enabled_digitizers().count(), 1);
    }

    #[test]
    fn test_kind_maps_to_element_kind() {
        for (kind, expected) in [
            (EventKind::List422, ElementKind::List422),
            (EventKind::List8222, ElementKind::List8222),
            (EventKind::Standard, ElementKind::Standard),
            (EventKind::Waveform422, ElementKind::Waveform422),
            (EventKind::Waveform8222, ElementKind::Waveform8222),
        ] {
            assert_eq!(kind.element_kind(), expected);
        }
    }
}
