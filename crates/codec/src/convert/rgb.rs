//! RGB family line codecs.
//!
//! Lines are carried as `[R, G, B, A]` at 16 bits. Widening replicates the
//! high bits into the low bits; narrowing truncates. Formats without alpha
//! read as opaque.

use essence_core::prelude::PixelFormat;

use super::line::{
    FrameSide, RgbLayout, RgbLine, read_u16, read_u32, widen2, widen8, widen10, write_u16,
    write_u32,
};

pub(crate) struct Rgba8;
pub(crate) struct Bgra8;
pub(crate) struct Bgr10a;
pub(crate) struct Bgr10aBs;
pub(crate) struct Gbrp16;

impl RgbLayout for Rgba8 {
    const FORMAT: PixelFormat = PixelFormat::Rgba8;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine) {
        let row = &frame[side.line(0, y)];
        for (px, s) in line.iter_mut().zip(row.chunks_exact(4)) {
            *px = [widen8(s[0]), widen8(s[1]), widen8(s[2]), widen8(s[3])];
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine) {
        let row = &mut frame[side.line(0, y)];
        for (d, px) in row.chunks_exact_mut(4).zip(line) {
            d.copy_from_slice(&[
                (px[0] >> 8) as u8,
                (px[1] >> 8) as u8,
                (px[2] >> 8) as u8,
                (px[3] >> 8) as u8,
            ]);
        }
    }
}

impl RgbLayout for Bgra8 {
    const FORMAT: PixelFormat = PixelFormat::Bgra8;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine) {
        let row = &frame[side.line(0, y)];
        for (px, s) in line.iter_mut().zip(row.chunks_exact(4)) {
            *px = [widen8(s[2]), widen8(s[1]), widen8(s[0]), widen8(s[3])];
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine) {
        let row = &mut frame[side.line(0, y)];
        for (d, px) in row.chunks_exact_mut(4).zip(line) {
            d.copy_from_slice(&[
                (px[2] >> 8) as u8,
                (px[1] >> 8) as u8,
                (px[0] >> 8) as u8,
                (px[3] >> 8) as u8,
            ]);
        }
    }
}

/// `A << 30 | B << 20 | G << 10 | R`.
#[inline(always)]
fn split_word(w: u32) -> [u16; 4] {
    [widen10(w), widen10(w >> 10), widen10(w >> 20), widen2(w >> 30)]
}

#[inline(always)]
fn join_word(px: &[u16; 4]) -> u32 {
    let r = (px[0] >> 6) as u32;
    let g = (px[1] >> 6) as u32;
    let b = (px[2] >> 6) as u32;
    let a = (px[3] >> 14) as u32;
    a << 30 | b << 20 | g << 10 | r
}

impl RgbLayout for Bgr10a {
    const FORMAT: PixelFormat = PixelFormat::Bgr10a;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine) {
        let row = &frame[side.line(0, y)];
        for (i, px) in line.iter_mut().enumerate() {
            *px = split_word(read_u32(row, i * 4));
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine) {
        let row = &mut frame[side.line(0, y)];
        for (i, px) in line.iter().enumerate() {
            write_u32(row, i * 4, join_word(px));
        }
    }
}

impl RgbLayout for Bgr10aBs {
    const FORMAT: PixelFormat = PixelFormat::Bgr10aBs;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine) {
        let row = &frame[side.line(0, y)];
        for (i, px) in line.iter_mut().enumerate() {
            *px = split_word(read_u32(row, i * 4).swap_bytes());
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine) {
        let row = &mut frame[side.line(0, y)];
        for (i, px) in line.iter().enumerate() {
            write_u32(row, i * 4, join_word(px).swap_bytes());
        }
    }
}

impl RgbLayout for Gbrp16 {
    const FORMAT: PixelFormat = PixelFormat::Gbrp16;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut RgbLine) {
        let g = &frame[side.line(0, y)];
        let b = &frame[side.line(1, y)];
        let r = &frame[side.line(2, y)];
        for (i, px) in line.iter_mut().enumerate() {
            let at = i * 2;
            *px = [read_u16(r, at), read_u16(g, at), read_u16(b, at), u16::MAX];
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &RgbLine) {
        for (plane, channel) in [(0, 1), (1, 2), (2, 0)] {
            let row = &mut frame[side.line(plane, y)];
            for (i, px) in line.iter().enumerate() {
                write_u16(row, i * 2, px[channel]);
            }
        }
    }
}
