use essence_codec::{CodecError, ConvertError};
use essence_core::prelude::{FormatError, PixelFormat};

/// Configuration errors raised while setting up a session.
///
/// These are returned synchronously from processor constructors and are
/// terminal for the session.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let err = Concater::new("MJPG", 1920, 1080).unwrap_err();
/// assert!(matches!(err, SetupError::Format(FormatError::UnknownFormat(_))));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// Unknown format code or invalid geometry.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// No conversion path or flip plan for the requested formats.
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// Backend rejected the configuration.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The processor does not handle this format.
    #[error("{processor}: unsupported format {format}")]
    UnsupportedFormat {
        /// Processor reporting the error.
        processor: &'static str,
        /// Offending format code.
        format: String,
    },
    /// Source and destination formats must match.
    #[error("source and destination format must be identical: {src} vs {dst}")]
    FormatMismatch {
        /// Source format.
        src: PixelFormat,
        /// Destination format.
        dst: PixelFormat,
    },
    /// Source and destination dimensions must match.
    #[error("dimension mismatch: {src_width}x{src_height} vs {dst_width}x{dst_height}")]
    DimensionMismatch {
        src_width: u32,
        src_height: u32,
        dst_width: u32,
        dst_height: u32,
    },
    /// A session parameter is missing or malformed.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Tag or parameter name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Per-frame failures, delivered through the completion callback.
///
/// A failed frame reports zero bytes; the output buffer is untouched when
/// the failure is detected before processing starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// A source buffer is smaller than its format requires.
    #[error("insufficient source buffer {index}: need {needed} bytes, got {actual}")]
    InsufficientSource {
        /// Position of the source in the job's inputs.
        index: usize,
        needed: usize,
        actual: usize,
    },
    /// The destination buffer is smaller than its format requires.
    #[error("insufficient destination buffer: need {needed} bytes, got {actual}")]
    InsufficientDestination { needed: usize, actual: usize },
    /// Wrong number of source buffers for the operation.
    #[error("expected {expected} source buffer(s), got {actual}")]
    MissingInput { expected: usize, actual: usize },
    /// The job carries no destination buffer.
    #[error("job has no destination buffer")]
    MissingOutput,
    /// Per-frame parameters do not fit the session.
    #[error("invalid frame parameters: {0}")]
    InvalidParams(String),
    /// Intermediate conversion failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
    /// Backend failure.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The processor panicked.
    #[error("processor panicked: {0}")]
    Panicked(String),
}
