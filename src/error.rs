//! yEnc error types

use thiserror::Error;

/// yEnc encoding and decoding errors
///
/// Every error is terminal for the decoder or encoder that produced it.
/// A new instance must be constructed to retry.
#[derive(Error, Debug)]
pub enum YencError {
    /// IO error from the underlying reader or writer
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed =ybegin, =ypart or =yend line, or a checksum mismatch
    #[error("Invalid yEnc format: {0}")]
    InvalidFormat(String),

    /// Well-formed metadata that disagrees with itself or with the decoded data
    #[error("yEnc data corruption: {0}")]
    DataCorruption(String),

    /// Data found before the =ybegin line while prefix data is not allowed
    #[error("yEnc stream does not start with =ybegin")]
    RejectPrefixData,

    /// Configured input buffer cannot hold the protocol keywords
    #[error("Buffer too small: need at least {required} bytes, got {capacity}")]
    BufferTooSmall {
        /// Minimum capacity required
        required: usize,
        /// Configured capacity
        capacity: usize,
    },

    /// More raw bytes were written to an encoder than the declared part size
    #[error("Writing too much: part size is {expected} bytes, attempted {attempted}")]
    WritingTooMuch {
        /// Declared part size
        expected: u64,
        /// Bytes that would have been encoded including this write
        attempted: u64,
    },

    /// Encoder finished with a different byte count than the declared part size
    #[error("Size mismatch: part size is {expected} bytes but {actual} were encoded")]
    SizeMismatch {
        /// Declared part size
        expected: u64,
        /// Bytes actually encoded
        actual: u64,
    },
}

impl YencError {
    /// Recover a `YencError` that was wrapped for the `std::io` traits
    ///
    /// `Decoder` and `Encoder` implement `Read`/`Write`, which can only report
    /// `io::Error`. Protocol errors travel inside `io::Error::other` and are
    /// unwrapped again here; any other IO error becomes `YencError::Io`.
    pub fn from_io(err: std::io::Error) -> Self {
        match err.downcast::<YencError>() {
            Ok(yenc) => yenc,
            Err(err) => YencError::Io(err),
        }
    }

    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            YencError::Io(err) => err,
            other => std::io::Error::other(other),
        }
    }
}

/// Result type alias using YencError
pub type Result<T> = std::result::Result<T, YencError>;
