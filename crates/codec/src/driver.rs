//! Contracts for the third-party encoder, decoder and scaler backends.
//!
//! Backends are stateful and run only on the pipeline worker, so every
//! operation takes `&mut self`. Frame numbers increase by one per call.

use std::{fmt, str::FromStr};

use essence_core::prelude::PixelFormat;

use crate::CodecError;

/// Role of a backend.
///
/// # Example
/// ```rust
/// use essence_codec::CodecKind;
///
/// let kind = CodecKind::Decoder;
/// assert_eq!(kind, CodecKind::Decoder);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CodecKind {
    /// Raw frames in, compressed payloads out.
    Encoder,
    /// Compressed payloads in, raw frames out.
    Decoder,
    /// Raw frames in, resized raw frames out.
    Scaler,
}

/// Describes a backend implementation.
///
/// # Example
/// ```rust
/// use essence_codec::{CodecDescriptor, CodecKind};
///
/// let desc = CodecDescriptor {
///     kind: CodecKind::Encoder,
///     name: "h264",
///     impl_name: "x264",
/// };
/// assert_eq!(desc.to_string(), "h264 encoder (x264)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CodecDescriptor {
    /// Encoder, decoder or scaler.
    pub kind: CodecKind,
    /// Algorithm family (e.g. "h264", "vp8", "bilinear").
    pub name: &'static str,
    /// Implementation/backend identifier.
    pub impl_name: &'static str,
}

impl fmt::Display for CodecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            CodecKind::Encoder => "encoder",
            CodecKind::Decoder => "decoder",
            CodecKind::Scaler => "scaler",
        };
        write!(f, "{} {kind} ({})", self.name, self.impl_name)
    }
}

/// Compressed stream formats handled by encoder and decoder backends.
///
/// # Example
/// ```rust
/// use essence_codec::CompressedFormat;
///
/// assert_eq!("vp8".parse::<CompressedFormat>().unwrap(), CompressedFormat::Vp8);
/// assert!("mjpeg".parse::<CompressedFormat>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CompressedFormat {
    H264,
    Vp8,
    Aac,
}

impl CompressedFormat {
    pub const fn code(self) -> &'static str {
        match self {
            CompressedFormat::H264 => "h264",
            CompressedFormat::Vp8 => "vp8",
            CompressedFormat::Aac => "aac",
        }
    }

    /// Whether the stream carries video.
    pub const fn is_video(self) -> bool {
        !matches!(self, CompressedFormat::Aac)
    }
}

impl fmt::Display for CompressedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CompressedFormat {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264" => Ok(CompressedFormat::H264),
            "vp8" => Ok(CompressedFormat::Vp8),
            "aac" => Ok(CompressedFormat::Aac),
            other => Err(CodecError::Unsupported(other.to_string())),
        }
    }
}

/// Encoder backend.
pub trait EncoderDriver: Send + 'static {
    fn descriptor(&self) -> &CodecDescriptor;

    /// Upper bound on the compressed size of one frame.
    fn bytes_required(&self) -> usize;

    /// Raw layout the backend consumes.
    fn packing_required(&self) -> PixelFormat;

    /// Encode one frame from `src` into `dst`, returning the bytes produced.
    fn encode_frame(&mut self, src: &[u8], dst: &mut [u8], frame: u64) -> Result<usize, CodecError>;
}

/// Decoder backend.
pub trait DecoderDriver: Send + 'static {
    fn descriptor(&self) -> &CodecDescriptor;

    /// Bytes of one decoded frame.
    fn bytes_required(&self) -> usize;

    /// Raw layout the backend produces.
    fn output_format(&self) -> PixelFormat {
        PixelFormat::Yuv420p
    }

    /// Decode one compressed frame, returning the bytes produced.
    fn decode_frame(
        &mut self,
        format: CompressedFormat,
        src: &[u8],
        dst: &mut [u8],
        frame: u64,
    ) -> Result<usize, CodecError>;
}

/// Scaler backend; its input and output geometry are fixed when constructed.
pub trait ScalerDriver: Send + 'static {
    fn descriptor(&self) -> &CodecDescriptor;

    /// Bytes of one scaled output frame.
    fn bytes_required(&self) -> usize;

    /// Raw layout the backend reads from.
    fn working_format(&self) -> PixelFormat;

    /// Scale and convert one frame, returning the bytes produced.
    fn scale_convert_frame(&mut self, src: &[u8], dst: &mut [u8], frame: u64) -> Result<usize, CodecError>;
}
