use std::path::PathBuf;

use thiserror::Error;

use crate::capture::SampleType;
use crate::device::DeviceState;

/// Errors surfaced by cameras and storage backends.
///
/// Every error is recovered at the device boundary: by the time a caller sees
/// one, the device has already moved to a well-defined state.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration
    #[error("binning must be a power of two between 1 and 8, got {0}")]
    InvalidBinning(u8),

    #[error("binning is only supported for 8-bit samples, got {0}")]
    BinningRequiresByteSamples(SampleType),

    #[error("path is not writable: {}", .0.display())]
    Unwritable(PathBuf),

    // Validation
    #[error("buffer too small: need {required} bytes, got {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    #[error("device is not running")]
    NotRunning,

    #[error("invalid device state: expected {expected}, found {found}")]
    InvalidState {
        expected: DeviceState,
        found: DeviceState,
    },

    // Allocation
    #[error("allocation of {0} bytes failed")]
    Allocation(usize),

    // IO
    #[error("write failed at offset {offset}: {source}")]
    Write {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Sequence
    #[error("expected frame id {expected}, got {actual} after {consumed} bytes")]
    FrameSequence {
        expected: i64,
        actual: i64,
        consumed: usize,
    },

    #[error("malformed frame record at byte {offset}")]
    MalformedRecord { offset: usize },
}

impl Error {
    /// Bytes of an append run that were accepted before this error occurred.
    pub fn bytes_consumed(&self) -> usize {
        match self {
            Self::FrameSequence { consumed, .. } => *consumed,
            Self::MalformedRecord { offset } => *offset,
            _ => 0,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
