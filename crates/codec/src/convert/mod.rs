//! Bit-exact pixel format conversion.
//!
//! Every supported `(src, dst)` pair is registered in a dispatch table built
//! on first use. [`Converter::new`] resolves the pair once and keeps the
//! function pointer, so per-frame work is a single indirect call.

mod flip;
mod line;
mod pgroup;
mod rgb;
mod uyvy10;
mod v210;
mod yuv420p;
mod yuv422p10;

use std::{collections::HashMap, sync::OnceLock};

use essence_core::prelude::{PixelFormat, Resolution};
use tracing::debug;

use crate::ConvertError;
pub use flip::FlipKernel;
use line::{FrameSide, RgbLayout, YuvLayout, YuvLine};
use pgroup::Pgroup;
use rgb::{Bgr10a, Bgr10aBs, Bgra8, Gbrp16, Rgba8};
use uyvy10::Uyvy10;
use v210::V210;
use yuv420p::Yuv420p;
use yuv422p10::Yuv422p10;

type ConvertFn = fn(&FrameSide, &FrameSide, &[u8], &mut [u8]);
type Table = HashMap<(PixelFormat, PixelFormat), ConvertFn>;

fn convert_yuv<S: YuvLayout, D: YuvLayout>(src_side: &FrameSide, dst_side: &FrameSide, src: &[u8], dst: &mut [u8]) {
    let mut line = YuvLine::new(src_side.width);
    for y in 0..src_side.height {
        S::unpack_line(src, src_side, y, &mut line);
        D::pack_line(dst, dst_side, y, &line);
    }
}

fn convert_rgb<S: RgbLayout, D: RgbLayout>(src_side: &FrameSide, dst_side: &FrameSide, src: &[u8], dst: &mut [u8]) {
    let mut line = vec![[0u16; 4]; src_side.width];
    for y in 0..src_side.height {
        S::unpack_line(src, src_side, y, &mut line);
        D::pack_line(dst, dst_side, y, &line);
    }
}

fn copy_frame(src_side: &FrameSide, _dst_side: &FrameSide, src: &[u8], dst: &mut [u8]) {
    dst[..src_side.bytes].copy_from_slice(&src[..src_side.bytes]);
}

fn register_yuv_from<S: YuvLayout>(table: &mut Table) {
    let s = S::FORMAT;
    table.insert((s, Pgroup::FORMAT), convert_yuv::<S, Pgroup>);
    table.insert((s, V210::FORMAT), convert_yuv::<S, V210>);
    table.insert((s, Yuv422p10::FORMAT), convert_yuv::<S, Yuv422p10>);
    table.insert((s, Uyvy10::FORMAT), convert_yuv::<S, Uyvy10>);
    table.insert((s, Yuv420p::FORMAT), convert_yuv::<S, Yuv420p>);
}

fn register_rgb_from<S: RgbLayout>(table: &mut Table) {
    let s = S::FORMAT;
    table.insert((s, Rgba8::FORMAT), convert_rgb::<S, Rgba8>);
    table.insert((s, Bgra8::FORMAT), convert_rgb::<S, Bgra8>);
    table.insert((s, Bgr10a::FORMAT), convert_rgb::<S, Bgr10a>);
    table.insert((s, Bgr10aBs::FORMAT), convert_rgb::<S, Bgr10aBs>);
    table.insert((s, Gbrp16::FORMAT), convert_rgb::<S, Gbrp16>);
}

fn table() -> &'static Table {
    static TABLE: OnceLock<Table> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = Table::new();
        register_yuv_from::<Pgroup>(&mut table);
        register_yuv_from::<V210>(&mut table);
        register_yuv_from::<Yuv422p10>(&mut table);
        register_yuv_from::<Uyvy10>(&mut table);
        register_yuv_from::<Yuv420p>(&mut table);
        register_rgb_from::<Rgba8>(&mut table);
        register_rgb_from::<Bgra8>(&mut table);
        register_rgb_from::<Bgr10a>(&mut table);
        register_rgb_from::<Bgr10aBs>(&mut table);
        register_rgb_from::<Gbrp16>(&mut table);
        for format in PixelFormat::ALL {
            table.insert((format, format), copy_frame);
        }
        table
    })
}

/// Converter bound to a format pair and frame size.
///
/// # Example
/// ```rust
/// use essence_codec::convert::Converter;
/// use essence_core::prelude::PixelFormat;
///
/// let conv = Converter::new(PixelFormat::Pgroup, PixelFormat::Yuv422p10, 2, 1).unwrap();
/// let mut out = vec![0u8; conv.dst_bytes()];
/// let written = conv.convert(&[0x80, 0x04, 0x08, 0x00, 0x40], &mut out).unwrap();
/// assert_eq!(written, 8);
/// assert_eq!(out, [0x40, 0x00, 0x40, 0x00, 0x00, 0x02, 0x00, 0x02]);
/// ```
pub struct Converter {
    resolution: Resolution,
    src: FrameSide,
    dst: FrameSide,
    kernel: ConvertFn,
}

impl Converter {
    /// Resolve the conversion for `src -> dst` at `width x height`.
    ///
    /// Fails if either format rejects the dimensions or no conversion is
    /// registered for the pair.
    pub fn new(src: PixelFormat, dst: PixelFormat, width: u32, height: u32) -> Result<Self, ConvertError> {
        let res = src.check_dimensions(width, height)?;
        dst.check_dimensions(width, height)?;
        let kernel = *table()
            .get(&(src, dst))
            .ok_or(ConvertError::UnsupportedPair { src, dst })?;
        debug!(%src, %dst, width, height, "conversion resolved");
        Ok(Self {
            resolution: res,
            src: FrameSide::new(src, res),
            dst: FrameSide::new(dst, res),
            kernel,
        })
    }

    /// Whether a conversion is registered for the pair.
    pub fn supports(src: PixelFormat, dst: PixelFormat) -> bool {
        table().contains_key(&(src, dst))
    }

    /// Every registered pair, sorted.
    pub fn supported_pairs() -> Vec<(PixelFormat, PixelFormat)> {
        let mut pairs: Vec<_> = table().keys().copied().collect();
        pairs.sort();
        pairs
    }

    /// Source format.
    pub fn src_format(&self) -> PixelFormat {
        self.src.format
    }

    /// Destination format.
    pub fn dst_format(&self) -> PixelFormat {
        self.dst.format
    }

    /// Bytes read from the source per frame.
    pub fn src_bytes(&self) -> usize {
        self.src.bytes
    }

    /// Bytes written to the destination per frame.
    pub fn dst_bytes(&self) -> usize {
        self.dst.bytes
    }

    /// Pass-through conversion between identical formats.
    pub fn is_unity(&self) -> bool {
        self.src.format == self.dst.format
    }

    /// Convert one frame, returning the number of bytes written.
    ///
    /// Buffer lengths are checked before anything is written; on error `dst`
    /// is left untouched. Only the first [`dst_bytes`](Self::dst_bytes) bytes
    /// of `dst` are written, including any line padding.
    pub fn convert(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, ConvertError> {
        if src.len() < self.src.bytes {
            return Err(ConvertError::SourceTooShort {
                needed: self.src.bytes,
                actual: src.len(),
            });
        }
        if dst.len() < self.dst.bytes {
            return Err(ConvertError::DestinationTooShort {
                needed: self.dst.bytes,
                actual: dst.len(),
            });
        }
        (self.kernel)(
            &self.src,
            &self.dst,
            &src[..self.src.bytes],
            &mut dst[..self.dst.bytes],
        );
        Ok(self.dst.bytes)
    }

    /// Frame resolution.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("src", &self.src.format)
            .field("dst", &self.dst.format)
            .field("width", &self.src.width)
            .field("height", &self.src.height)
            .finish()
    }
}
