//! Pipeline error types

use readout_format::FormatError;
use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The dispatcher (or a sink) dropped its receiving end
    #[error("batch channel closed")]
    ChannelClosed,

    /// A single element is larger than the producer's whole byte budget
    ///
    /// Flush-and-retry cannot help here: the element would not fit in an
    /// empty buffer either. This is a configuration problem (budget too
    /// small for the configured waveform length), not a data problem.
    #[error("element of {element_bytes} bytes exceeds the whole buffer budget of {budget}")]
    ElementTooLarge {
        element_bytes: usize,
        budget: usize,
    },

    /// Wire format error
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
