//! Sink configuration types
//!
//! Sinks are named instances, allowing multiple sinks of the same type
//! (e.g., a debug text sink next to the production columnar one).

use serde::Deserialize;
use std::collections::HashMap;

use readout_format::DEFAULT_DATA_PORT;

/// Container for all sink configurations
///
/// Sinks are stored as a map of name -> config.
///
/// # Example
///
/// ```toml
/// [sinks.text]
/// type = "text"
/// path = "runs/"
///
/// [sinks.udp_monitor]
/// type = "udp"
/// address = "192.168.1.40"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SinksConfig {
    /// Named sink instances
    #[serde(flatten)]
    sinks: HashMap<String, SinkConfig>,
}

impl SinksConfig {
    /// Get a sink by name
    pub fn get(&self, name: &str) -> Option<&SinkConfig> {
        self.sinks.get(name)
    }

    /// Check if a sink exists
    pub fn contains(&self, name: &str) -> bool {
        self.sinks.contains_key(name)
    }

    /// Iterate over all sinks
    pub fn iter(&self) -> impl Iterator<Item = (&String, &SinkConfig)> {
        self.sinks.iter()
    }

    /// Get the number of configured sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Check if no sinks are configured
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Get all sink names
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.sinks.keys()
    }
}

/// Configuration for a single sink instance
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Null sink - discards all data (for benchmarking)
    Null(NullSinkConfig),

    /// Text sink - human-readable per-run file
    Text(TextSinkConfig),

    /// UDP sink - one wire frame per datagram
    Udp(UdpSinkConfig),

    /// Columnar sink - self-describing binary file
    Columnar(ColumnarSinkConfig),
}

impl SinkConfig {
    /// Check if the sink is enabled
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Null(c) => c.enabled,
            Self::Text(c) => c.enabled,
            Self::Udp(c) => c.enabled,
            Self::Columnar(c) => c.enabled,
        }
    }

    /// Get the sink type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Text(_) => "text",
            Self::Udp(_) => "udp",
            Self::Columnar(_) => "columnar",
        }
    }

    /// Check if this sink transmits over the network
    ///
    /// Network sinks constrain the producer's byte budget to the
    /// datagram payload budget.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Udp(_))
    }
}

/// Null sink configuration - discards all data
///
/// Useful for measuring pipeline throughput.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NullSinkConfig {
    /// Whether this sink is enabled
    /// Default: true
    pub enabled: bool,
}

impl Default for NullSinkConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Text sink configuration - human-readable output
///
/// # Example
///
/// ```toml
/// [sinks.text]
/// type = "text"
/// path = "runs/"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TextSinkConfig {
    /// Whether this sink is enabled
    /// Default: true
    pub enabled: bool,

    /// Output directory path
    /// Default: "runs"
    pub path: String,
}

impl Default for TextSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "runs".to_string(),
        }
    }
}

/// UDP sink configuration - streams frames to a receiver
///
/// # Example
///
/// ```toml
/// [sinks.udp]
/// type = "udp"
/// address = "192.168.1.40"
/// port = 12345
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UdpSinkConfig {
    /// Whether this sink is enabled
    /// Default: true
    pub enabled: bool,

    /// Receiver host or address
    /// Required when enabled
    pub address: String,

    /// Receiver port
    /// Default: 12345
    pub port: u16,
}

impl Default for UdpSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: String::new(),
            port: DEFAULT_DATA_PORT,
        }
    }
}

impl UdpSinkConfig {
    /// Receiver endpoint as a connect string
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Compression type for the columnar sink
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression (default)
    #[default]
    None,
    /// LZ4 frame compression (fast, moderate ratio)
    Lz4,
}

/// Columnar sink configuration - self-describing binary storage
///
/// # Example
///
/// ```toml
/// [sinks.columnar]
/// type = "columnar"
/// path = "data/"
/// compression = "lz4"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnarSinkConfig {
    /// Whether this sink is enabled
    /// Default: true
    pub enabled: bool,

    /// Output directory path
    /// Default: "data"
    pub path: String,

    /// Compression type
    /// Default: none
    pub compression: Compression,
}

impl Default for ColumnarSinkConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data".to_string(),
            compression: Compression::None,
        }
    }
}
