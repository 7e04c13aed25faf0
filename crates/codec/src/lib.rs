#![doc = include_str!("../README.md")]

use essence_core::prelude::{FormatError, PixelFormat};

pub mod convert;
pub mod driver;

pub use driver::{CodecDescriptor, CodecKind, CompressedFormat, DecoderDriver, EncoderDriver, ScalerDriver};

/// Errors raised when planning or running a conversion.
///
/// # Example
/// ```rust
/// use essence_codec::ConvertError;
/// use essence_core::prelude::PixelFormat;
///
/// let err = ConvertError::UnsupportedPair {
///     src: PixelFormat::V210,
///     dst: PixelFormat::Rgba8,
/// };
/// assert_eq!(err.to_string(), "no conversion registered from v210 to RGBA8");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// No conversion function exists for the pair.
    #[error("no conversion registered from {src} to {dst}")]
    UnsupportedPair {
        /// Source format.
        src: PixelFormat,
        /// Destination format.
        dst: PixelFormat,
    },
    /// Only packed formats can be flipped.
    #[error("flip not supported for {0}")]
    UnsupportedFlip(PixelFormat),
    /// Format rejected the requested geometry.
    #[error(transparent)]
    Format(#[from] FormatError),
    /// Source buffer is smaller than one frame.
    #[error("source buffer too short: need {needed} bytes, got {actual}")]
    SourceTooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes supplied.
        actual: usize,
    },
    /// Destination buffer is smaller than one frame.
    #[error("destination buffer too short: need {needed} bytes, got {actual}")]
    DestinationTooShort {
        /// Bytes required.
        needed: usize,
        /// Bytes supplied.
        actual: usize,
    },
}

/// Errors emitted by codec and scaler backends.
///
/// # Example
/// ```rust
/// use essence_codec::CodecError;
///
/// let err = CodecError::Codec("bitstream corrupt".into());
/// assert_eq!(err.to_string(), "codec error: bitstream corrupt");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Backend-specific failure detail.
    #[error("codec error: {0}")]
    Codec(String),
    /// The requested stream or raw format is not handled.
    #[error("unsupported format {0:?}")]
    Unsupported(String),
    /// The backend accepted input but produced no output yet.
    #[error("codec backpressure")]
    Backpressure,
    /// Intermediate conversion failed.
    #[error(transparent)]
    Convert(#[from] ConvertError),
}

pub mod prelude {
    pub use crate::{
        CodecDescriptor, CodecError, CodecKind, CompressedFormat, ConvertError,
        DecoderDriver, EncoderDriver, ScalerDriver,
        convert::{Converter, FlipKernel},
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_error_wraps_format_error() {
        let err: CodecError = ConvertError::from(FormatError::UnknownFormat("x".into())).into();
        assert!(matches!(err, CodecError::Convert(ConvertError::Format(_))));
    }
}
