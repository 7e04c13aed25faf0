//! `v210`: four little-endian words carry 6 pixels; lines pad to 48 pixels.
//!
//! ```text
//! w0 = Cb0 | Y0 << 10 | Cr0 << 20
//! w1 = Y1  | Cb1 << 10 | Y2 << 20
//! w2 = Cr1 | Y3 << 10 | Cb2 << 20
//! w3 = Y4  | Cr2 << 10 | Y5 << 20
//! ```

use essence_core::prelude::PixelFormat;

use super::line::{FrameSide, YuvLayout, YuvLine, read_u32, write_u32};

pub(crate) struct V210;

const GROUP_BYTES: usize = 16;
const GROUP_PIXELS: usize = 6;

impl YuvLayout for V210 {
    const FORMAT: PixelFormat = PixelFormat::V210;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine) {
        let row = &frame[side.line(0, y)];
        for g in 0..side.width.div_ceil(GROUP_PIXELS) {
            let at = g * GROUP_BYTES;
            let w = [
                read_u32(row, at),
                read_u32(row, at + 4),
                read_u32(row, at + 8),
                read_u32(row, at + 12),
            ];
            let luma = [
                w[0] >> 10,
                w[1],
                w[1] >> 20,
                w[2] >> 10,
                w[3],
                w[3] >> 20,
            ];
            let cb = [w[0], w[1] >> 10, w[2] >> 20];
            let cr = [w[0] >> 20, w[2], w[3] >> 10];

            let first = g * GROUP_PIXELS;
            let pixels = (side.width - first).min(GROUP_PIXELS);
            for (dst, src) in line.y[first..first + pixels].iter_mut().zip(luma) {
                *dst = (src & 0x3ff) as u16;
            }
            let c = first / 2;
            for k in 0..pixels / 2 {
                line.u[c + k] = (cb[k] & 0x3ff) as u16;
                line.v[c + k] = (cr[k] & 0x3ff) as u16;
            }
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine) {
        let row = &mut frame[side.line(0, y)];
        let groups = side.width.div_ceil(GROUP_PIXELS);
        for g in 0..groups {
            let first = g * GROUP_PIXELS;
            let pixels = (side.width - first).min(GROUP_PIXELS);
            let mut luma = [0u32; GROUP_PIXELS];
            let mut cb = [0u32; 3];
            let mut cr = [0u32; 3];
            for (dst, &src) in luma.iter_mut().zip(&line.y[first..first + pixels]) {
                *dst = (src & 0x3ff) as u32;
            }
            let c = first / 2;
            for k in 0..pixels / 2 {
                cb[k] = (line.u[c + k] & 0x3ff) as u32;
                cr[k] = (line.v[c + k] & 0x3ff) as u32;
            }
            let at = g * GROUP_BYTES;
            write_u32(row, at, cb[0] | luma[0] << 10 | cr[0] << 20);
            write_u32(row, at + 4, luma[1] | cb[1] << 10 | luma[2] << 20);
            write_u32(row, at + 8, cr[1] | luma[3] << 10 | cb[2] << 20);
            write_u32(row, at + 12, luma[4] | cr[2] << 10 | luma[5] << 20);
        }
        row[groups * GROUP_BYTES..].fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_core::prelude::Resolution;

    fn ramp(width: usize) -> YuvLine {
        let mut line = YuvLine::new(width);
        for (i, y) in line.y.iter_mut().enumerate() {
            *y = 64 + i as u16;
        }
        for i in 0..width / 2 {
            line.u[i] = 300 + i as u16;
            line.v[i] = 700 + i as u16;
        }
        line
    }

    #[test]
    fn full_group_word_layout() {
        let side = FrameSide::new(PixelFormat::V210, Resolution::new(6, 1).unwrap());
        let mut row = vec![0xffu8; side.pitch];
        V210::pack_line(&mut row, &side, 0, &ramp(6));
        assert_eq!(read_u32(&row, 0), 300 | 64 << 10 | 700 << 20);
        assert_eq!(read_u32(&row, 4), 65 | 301 << 10 | 66 << 20);
        assert_eq!(read_u32(&row, 8), 701 | 67 << 10 | 302 << 20);
        assert_eq!(read_u32(&row, 12), 68 | 702 << 10 | 69 << 20);
        assert!(row[16..].iter().all(|&b| b == 0));
    }

    #[test]
    fn partial_groups_zero_unused_channels() {
        let side = FrameSide::new(PixelFormat::V210, Resolution::new(4, 1).unwrap());
        let mut row = vec![0u8; side.pitch];
        V210::pack_line(&mut row, &side, 0, &ramp(4));
        assert_eq!(read_u32(&row, 8), 701 | 67 << 10);
        assert_eq!(read_u32(&row, 12), 0);

        let side = FrameSide::new(PixelFormat::V210, Resolution::new(2, 1).unwrap());
        let mut row = vec![0u8; side.pitch];
        V210::pack_line(&mut row, &side, 0, &ramp(2));
        assert_eq!(read_u32(&row, 4), 65);
        assert_eq!(read_u32(&row, 8), 0);
    }

    #[test]
    fn width_100_round_trips() {
        let side = FrameSide::new(PixelFormat::V210, Resolution::new(100, 1).unwrap());
        let line = ramp(100);
        let mut row = vec![0u8; side.pitch];
        V210::pack_line(&mut row, &side, 0, &line);
        let mut back = YuvLine::new(100);
        V210::unpack_line(&row, &side, 0, &mut back);
        assert_eq!(back, line);
    }
}
