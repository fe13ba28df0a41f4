//! Producer - per-digitizer batch assembly
//!
//! One `Producer` runs next to each digitizer's acquisition loop. It
//! packs incoming events into an `EventBuffer` and seals the buffer into
//! a batch at a flush boundary: the byte budget filling up, the element
//! count reaching its limit, or an explicit flush on the readout tick.
//!
//! The budget path is lossless by construction: when an event does not
//! fit, the current buffer is flushed first and the event goes into the
//! fresh one. Only an event that would not fit into an *empty* buffer is
//! an error, and that is a configuration problem, not a data problem.

use std::time::{SystemTime, UNIX_EPOCH};

use readout_format::{BatchMeta, DigitizerEvent, Element, ElementKind, EventBuffer, SealedBatch};
use tokio::sync::mpsc;

use crate::error::{PipelineError, Result};

/// Clock supplying the per-flush global timestamp, injectable for tests
type Clock = Box<dyn Fn() -> u64 + Send>;

/// Configuration for one producer
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Acquisition run this producer belongs to
    pub run_id: u64,

    /// Hardware unit feeding this producer
    pub digitizer_id: u32,

    /// Element encoding this digitizer is configured for
    pub kind: ElementKind,

    /// Element-byte budget per batch (frame header not included)
    pub byte_budget: usize,

    /// Flush boundary by element count
    pub max_elements: usize,
}

/// Counters kept by one producer, returned by `close`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Events appended
    pub events: u64,
    /// Batches sealed and sent
    pub batches: u64,
    /// Flushes forced by the byte budget
    pub budget_flushes: u64,
}

/// Packs one digitizer's events into sealed batches
pub struct Producer {
    run_id: u64,
    digitizer_id: u32,
    kind: ElementKind,
    max_elements: usize,
    buffer: EventBuffer,
    seq_num: u32,
    stats: ProducerStats,
    clock: Clock,
    sender: mpsc::Sender<SealedBatch>,
}

impl Producer {
    /// Create a producer using wall-clock milliseconds as the timestamp
    pub fn new(config: ProducerConfig, sender: mpsc::Sender<SealedBatch>) -> Self {
        Self::with_clock(config, sender, Box::new(epoch_millis))
    }

    /// Create a producer with an injected timestamp source
    pub fn with_clock(
        config: ProducerConfig,
        sender: mpsc::Sender<SealedBatch>,
        clock: Clock,
    ) -> Self {
        // num_elements travels as u16; the count boundary must respect that.
        let max_elements = config.max_elements.clamp(1, u16::MAX as usize);
        Self {
            run_id: config.run_id,
            digitizer_id: config.digitizer_id,
            kind: config.kind,
            max_elements,
            buffer: EventBuffer::new(config.kind, config.byte_budget),
            seq_num: 0,
            stats: ProducerStats::default(),
            clock,
            sender,
        }
    }

    /// Element kind this producer packs
    #[inline]
    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Sequence number the next sealed batch will carry
    #[inline]
    pub fn seq_num(&self) -> u32 {
        self.seq_num
    }

    /// Elements waiting in the open buffer
    #[inline]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Build the element for `event` and append it, flushing as needed
    pub async fn push(&mut self, event: &impl DigitizerEvent, group: u16) -> Result<()> {
        let element = Element::from_event(self.kind, event, group)?;
        self.push_element(element).await
    }

    /// Append an already-built element, flushing as needed
    ///
    /// When the element does not fit the remaining budget, the buffer is
    /// flushed and the element lands in the fresh one; the event is
    /// never dropped. Reaching the count boundary flushes after the
    /// append.
    pub async fn push_element(&mut self, element: Element) -> Result<()> {
        let element_bytes = element.byte_size();
        let budget = self.buffer.budget();
        if element_bytes > budget {
            return Err(PipelineError::ElementTooLarge {
                element_bytes,
                budget,
            });
        }

        if self.buffer.byte_size() + element_bytes > budget {
            self.stats.budget_flushes += 1;
            self.flush().await?;
        }
        self.buffer.append(element)?;
        self.stats.events += 1;

        if self.buffer.len() >= self.max_elements {
            self.flush().await?;
        }
        Ok(())
    }

    /// Seal and send the open buffer; a no-op when it is empty
    pub async fn flush(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let buffer = self.buffer.take();
        let meta = BatchMeta {
            run_id: self.run_id,
            global_time: (self.clock)(),
            digitizer_id: self.digitizer_id,
            seq_num: self.seq_num,
        };
        self.seq_num = self.seq_num.wrapping_add(1);
        self.stats.batches += 1;

        tracing::trace!(
            digitizer = self.digitizer_id,
            seq = meta.seq_num,
            elements = buffer.len(),
            bytes = buffer.byte_size(),
            "batch sealed"
        );

        self.sender
            .send(SealedBatch { meta, buffer })
            .await
            .map_err(|_| PipelineError::ChannelClosed)
    }

    /// Flush any remaining events and return the final counters
    pub async fn close(mut self) -> Result<ProducerStats> {
        self.flush().await?;
        tracing::info!(
            digitizer = self.digitizer_id,
            events = self.stats.events,
            batches = self.stats.batches,
            budget_flushes = self.stats.budget_flushes,
            "producer closed"
        );
        Ok(self.stats)
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .field("digitizer_id", &self.digitizer_id)
            .field("kind", &self.kind)
            .field("seq_num", &self.seq_num)
            .field("pending", &self.buffer.len())
            .finish()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "producer_test.rs"]
mod producer_test;
