use essence_core::prelude::PixelFormat;

use super::line::{FrameSide, YuvLayout, YuvLine, read_u16, write_u16};

/// Interleaved `U Y0 V Y1`, one little-endian `u16` per sample.
pub(crate) struct Uyvy10;

impl YuvLayout for Uyvy10 {
    const FORMAT: PixelFormat = PixelFormat::Uyvy10;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine) {
        let row = &frame[side.line(0, y)];
        for i in 0..side.width / 2 {
            let at = i * 8;
            line.u[i] = read_u16(row, at) & 0x3ff;
            line.y[2 * i] = read_u16(row, at + 2) & 0x3ff;
            line.v[i] = read_u16(row, at + 4) & 0x3ff;
            line.y[2 * i + 1] = read_u16(row, at + 6) & 0x3ff;
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine) {
        let row = &mut frame[side.line(0, y)];
        for i in 0..side.width / 2 {
            let at = i * 8;
            write_u16(row, at, line.u[i]);
            write_u16(row, at + 2, line.y[2 * i]);
            write_u16(row, at + 4, line.v[i]);
            write_u16(row, at + 6, line.y[2 * i + 1]);
        }
    }
}
