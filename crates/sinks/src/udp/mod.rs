//! UDP sink - one datagram per sealed batch
//!
//! Encodes each batch as a single frame (header plus packed elements)
//! and sends it to a remote consumer. The frame must fit under the
//! datagram payload budget; a producer feeding this sink sizes its
//! buffers so that it always does, and the check here is the last line
//! of defence before a silent kernel-side truncation.
//!
//! The socket is a plain blocking `std::net` socket: each sink runs on
//! its own task and a UDP send does not block in practice.

use std::net::{ToSocketAddrs, UdpSocket};
use std::sync::Arc;

use readout_format::{encode_frame, net_payload_budget, BatchMeta, EventBuffer};

use crate::common::{EventSink, SinkError, SinkMetrics, SinkMetricsHandle};

/// Sink that transmits every batch as one datagram
pub struct UdpSink {
    name: String,
    socket: UdpSocket,
    /// Whole-frame byte budget under the configured payload ceiling
    budget: usize,
    metrics: Arc<SinkMetrics>,
}

impl UdpSink {
    /// Bind an ephemeral local port and connect to `remote`
    ///
    /// `payload_ceiling` is the full datagram ceiling (MTU-like); the
    /// usable frame budget subtracts IP and UDP overhead from it.
    pub fn new(
        name: impl Into<String>,
        remote: impl ToSocketAddrs,
        payload_ceiling: usize,
    ) -> Result<Self, SinkError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0))?;
        socket
            .connect(remote)
            .map_err(|e| SinkError::init(format!("could not connect data socket: {e}")))?;
        Ok(Self {
            name: name.into(),
            socket,
            budget: net_payload_budget(payload_ceiling),
            metrics: Arc::new(SinkMetrics::new()),
        })
    }

    /// Frame byte budget enforced per datagram
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Metrics handle that stays valid after `drive` consumes the sink
    pub fn metrics_handle(&self) -> SinkMetricsHandle {
        SinkMetricsHandle::new(self.name.clone(), Arc::clone(&self.metrics))
    }
}

impl EventSink for UdpSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_network(&self) -> bool {
        true
    }

    fn metrics(&self) -> &SinkMetrics {
        &self.metrics
    }

    fn accept(&mut self, meta: &BatchMeta, buffer: &EventBuffer) -> Result<(), SinkError> {
        let frame = encode_frame(meta, buffer);
        if frame.len() > self.budget {
            return Err(SinkError::PayloadTooLarge {
                size: frame.len(),
                budget: self.budget,
            });
        }
        self.socket.send(&frame)?;
        self.metrics
            .batch_written(buffer.len() as u64, frame.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
#[path = "udp_test.rs"]
mod udp_test;
