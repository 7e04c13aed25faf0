use essence_core::prelude::PixelFormat;

use super::line::{FrameSide, YuvLayout, YuvLine, read_u16, write_u16};

/// Planar 10-bit 4:2:2, one little-endian `u16` per sample.
pub(crate) struct Yuv422p10;

impl YuvLayout for Yuv422p10 {
    const FORMAT: PixelFormat = PixelFormat::Yuv422p10;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine) {
        for (plane, samples) in [(0, &mut line.y), (1, &mut line.u), (2, &mut line.v)] {
            let row = &frame[side.line(plane, y)];
            for (i, s) in samples.iter_mut().enumerate() {
                *s = read_u16(row, i * 2) & 0x3ff;
            }
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine) {
        for (plane, samples) in [(0, &line.y), (1, &line.u), (2, &line.v)] {
            let row = &mut frame[side.line(plane, y)];
            for (i, &s) in samples.iter().enumerate() {
                write_u16(row, i * 2, s);
            }
        }
    }
}
