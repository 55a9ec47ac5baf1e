use thiserror::Error;

use crate::image::{Bounds, PartitionId};

// Unified error type for sortlast

#[derive(Error, Debug)]
pub enum CompositeError {
    #[error("configuration error: {0}")]
    ConfigurationError(String),
    #[error("z-buffer compositing requires a depth buffer (partition {0} has none)")]
    MissingBufferError(PartitionId),
    #[error("bounds {requested} do not intersect {available}")]
    OutOfBoundsError { requested: Bounds, available: Bounds },
    #[error("messaging failure: {0}")]
    MessagingFailure(String),
    #[error("malformed image message: {0}")]
    MalformedMessage(String),
    #[error("{buffer} buffer holds {actual} values, bounds {bounds} need {expected}")]
    BufferLengthError {
        buffer: &'static str,
        bounds: Bounds,
        expected: usize,
        actual: usize,
    },
}
