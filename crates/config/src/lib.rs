//! Readout configuration
//!
//! TOML-based configuration loading with sensible defaults. A minimal
//! config only needs a digitizer and a sink; everything else falls back
//! to defaults.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use readout_config::Config;
//! use std::str::FromStr;
//!
//! let toml = r#"
//! [[acquisition.digitizers]]
//! id = 137
//!
//! [sinks.text]
//! type = "text"
//! "#;
//! let config = Config::from_str(toml).unwrap();
//! ```
//!
//! # Example Full Config
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [acquisition]
//! run_id = 42
//! flush_interval = "500ms"
//! payload_ceiling = 9000
//! max_elements = 1024
//!
//! [[acquisition.digitizers]]
//! id = 137
//! kind = "waveform422"
//! channel_groups = 2
//!
//! [sinks.text]
//! type = "text"
//! path = "runs/"
//!
//! [sinks.udp]
//! type = "udp"
//! address = "192.168.1.40"
//! ```

mod acquisition;
mod error;
mod logging;
mod sinks;

use std::fs;
use std::path::Path;
use std::str::FromStr;

pub use acquisition::{AcquisitionConfig, DigitizerConfig, EventKind};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};
pub use sinks::{
    ColumnarSinkConfig, Compression, NullSinkConfig, SinkConfig, SinksConfig, TextSinkConfig,
    UdpSinkConfig,
};

use readout_format::{Header, IP_HEADER_BYTES, UDP_HEADER_BYTES};
use serde::Deserialize;
use std::collections::HashSet;

/// Main configuration structure
///
/// All sections are optional with sensible defaults, though validation
/// requires at least one enabled digitizer and one enabled sink.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Run and digitizer settings
    pub acquisition: AcquisitionConfig,

    /// Data sinks (text, udp, columnar, null)
    pub sinks: SinksConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, contains invalid TOML,
    /// or fails validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string
    ///
    /// Prefer using the `FromStr` trait implementation.
    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Checks for:
    /// - Duplicate digitizer ids
    /// - At least one enabled digitizer and one enabled sink
    /// - Required sink fields (UDP address, output paths)
    /// - Payload ceiling large enough to carry a frame header
    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for digitizer in &self.acquisition.digitizers {
            if !seen.insert(digitizer.id) {
                return Err(ConfigError::duplicate_digitizer(digitizer.id));
            }
        }

        if self.acquisition.enabled_digitizers().next().is_none() {
            return Err(ConfigError::NoDigitizersEnabled);
        }

        if !self.sinks.iter().any(|(_, sink)| sink.is_enabled()) {
            return Err(ConfigError::NoSinksEnabled);
        }

        if self.acquisition.max_elements == 0 {
            return Err(ConfigError::invalid_value(
                "acquisition",
                "acquisition",
                "max_elements",
                "must be at least 1",
            ));
        }

        // The ceiling must leave room for the 32-byte header plus at
        // least one element after IP and UDP overhead.
        let overhead = IP_HEADER_BYTES + UDP_HEADER_BYTES + Header::SIZE;
        if self.has_network_sink() && self.acquisition.payload_ceiling <= overhead {
            return Err(ConfigError::invalid_value(
                "acquisition",
                "acquisition",
                "payload_ceiling",
                format!("must exceed {} bytes of protocol overhead", overhead),
            ));
        }

        for (name, sink) in self.sinks.iter() {
            if !sink.is_enabled() {
                continue;
            }
            match sink {
                SinkConfig::Udp(c) if c.address.is_empty() => {
                    return Err(ConfigError::missing_field("sink", name, "address"));
                }
                SinkConfig::Text(c) if c.path.is_empty() => {
                    return Err(ConfigError::missing_field("sink", name, "path"));
                }
                SinkConfig::Columnar(c) if c.path.is_empty() => {
                    return Err(ConfigError::missing_field("sink", name, "path"));
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Get list of enabled sink names
    pub fn enabled_sinks(&self) -> Vec<String> {
        self.sinks
            .iter()
            .filter(|(_, sink)| sink.is_enabled())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Check whether any enabled sink transmits over the network
    ///
    /// When true, producers take the datagram payload budget instead of
    /// an unbounded one.
    pub fn has_network_sink(&self) -> bool {
        self.sinks
            .iter()
            .any(|(_, sink)| sink.is_enabled() && sink.is_network())
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
