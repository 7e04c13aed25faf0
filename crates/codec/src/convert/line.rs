use essence_core::prelude::{PixelFormat, PlaneLayout, Resolution};
use smallvec::SmallVec;

/// Geometry of one side of a conversion, derived once per session.
#[derive(Debug, Clone)]
pub(crate) struct FrameSide {
    pub format: PixelFormat,
    pub width: usize,
    pub height: usize,
    pub pitch: usize,
    pub planes: SmallVec<[PlaneLayout; 4]>,
    pub bytes: usize,
}

impl FrameSide {
    pub fn new(format: PixelFormat, res: Resolution) -> Self {
        let (w, h) = (res.width.get(), res.height.get());
        let planes = format.plane_layouts(w, h, false);
        let bytes = planes.last().map(|p| p.offset + p.len).unwrap_or(0);
        Self {
            format,
            width: w as usize,
            height: h as usize,
            pitch: format.pitch(w),
            planes,
            bytes,
        }
    }

    /// Byte range of line `y` within plane `plane`.
    #[inline]
    pub fn line(&self, plane: usize, y: usize) -> std::ops::Range<usize> {
        let p = &self.planes[plane];
        let start = p.offset + y * p.stride;
        start..start + p.stride
    }
}

/// One line of 10-bit 4:2:2 samples.
///
/// `u` and `v` hold one sample per pixel pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct YuvLine {
    pub y: Vec<u16>,
    pub u: Vec<u16>,
    pub v: Vec<u16>,
}

impl YuvLine {
    pub fn new(width: usize) -> Self {
        Self {
            y: vec![0; width],
            u: vec![0; width / 2],
            v: vec![0; width / 2],
        }
    }

    /// Mirror left to right; chroma pairs stay attached to their luma pair.
    pub fn mirror(&mut self) {
        self.y.reverse();
        self.u.reverse();
        self.v.reverse();
    }
}

/// One line of `[R, G, B, A]` pixels at 16 bits per channel.
pub(crate) type RgbLine = Vec<[u16; 4]>;

/// Line codec for a YUV family format.
///
/// `unpack_line` widens or narrows into 10-bit 4:2:2 samples; `pack_line`
/// is its mirror. Both address line `y` of the full frame so subsampled
/// formats can pick their chroma line.
pub(crate) trait YuvLayout {
    const FORMAT: PixelFormat;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine);

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine);
}

/// Line codec for an RGB family format.
pub(crate) trait RgbLayout {
    const FORMAT: PixelFormat;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine);

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine);
}

#[inline(always)]
pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

#[inline(always)]
pub(crate) fn write_u16(buf: &mut [u8], at: usize, value: u16) {
    buf[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline(always)]
pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

#[inline(always)]
pub(crate) fn write_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

/// Replicate an 8-bit value into 16 bits.
#[inline(always)]
pub(crate) const fn widen8(v: u8) -> u16 {
    (v as u16) << 8 | v as u16
}

/// Replicate a 10-bit value into 16 bits.
#[inline(always)]
pub(crate) const fn widen10(v: u32) -> u16 {
    let v = (v & 0x3ff) as u16;
    v << 6 | v >> 4
}

/// Replicate a 2-bit value into 16 bits.
#[inline(always)]
pub(crate) const fn widen2(v: u32) -> u16 {
    (v & 0x3) as u16 * 0x5555
}
