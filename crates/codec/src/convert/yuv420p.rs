//! Planar 8-bit 4:2:0.
//!
//! Packing averages chroma over line pairs: an even line stores its own
//! chroma, the following odd line replaces it with `(stored + own) >> 1`.
//! Unpacking repeats each chroma line for both lines of its pair.

use essence_core::prelude::PixelFormat;

use super::line::{FrameSide, YuvLayout, YuvLine};

pub(crate) struct Yuv420p;

impl YuvLayout for Yuv420p {
    const FORMAT: PixelFormat = PixelFormat::Yuv420p;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine) {
        let luma = &frame[side.line(0, y)];
        for (dst, &src) in line.y.iter_mut().zip(luma) {
            *dst = (src as u16) << 2;
        }
        let u = &frame[side.line(1, y / 2)];
        let v = &frame[side.line(2, y / 2)];
        for i in 0..line.u.len() {
            line.u[i] = (u[i] as u16) << 2;
            line.v[i] = (v[i] as u16) << 2;
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine) {
        let luma = &mut frame[side.line(0, y)];
        for (dst, &src) in luma.iter_mut().zip(&line.y) {
            *dst = ((src & 0x3ff) >> 2) as u8;
        }
        let odd = y & 1 == 1;
        for (plane, samples) in [(1, &line.u), (2, &line.v)] {
            let row = &mut frame[side.line(plane, y / 2)];
            for (dst, &src) in row.iter_mut().zip(samples) {
                let c = (src & 0x3ff) >> 2;
                *dst = if odd {
                    ((*dst as u16 + c) >> 1) as u8
                } else {
                    c as u8
                };
            }
        }
    }
}
