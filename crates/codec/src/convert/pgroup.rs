//! RFC4175 `pgroup`: 5 bytes carry `U Y0 V Y1` at 10 bits each, MSB first.

use essence_core::prelude::PixelFormat;

use super::line::{FrameSide, YuvLayout, YuvLine};

pub(crate) struct Pgroup;

impl YuvLayout for Pgroup {
    const FORMAT: PixelFormat = PixelFormat::Pgroup;

    fn unpack_line(frame: &[u8], side: &FrameSide, y: usize, line: &mut YuvLine) {
        let row = &frame[side.line(0, y)];
        for (i, s) in row.chunks_exact(5).take(side.width / 2).enumerate() {
            let (s0, s1, s2, s3, s4) = (
                s[0] as u16,
                s[1] as u16,
                s[2] as u16,
                s[3] as u16,
                s[4] as u16,
            );
            line.u[i] = s0 << 2 | s1 >> 6;
            line.y[2 * i] = (s1 & 0x3f) << 4 | s2 >> 4;
            line.v[i] = (s2 & 0x0f) << 6 | s3 >> 2;
            line.y[2 * i + 1] = (s3 & 0x03) << 8 | s4;
        }
    }

    fn pack_line(frame: &mut [u8], side: &FrameSide, y: usize, line: &YuvLine) {
        let row = &mut frame[side.line(0, y)];
        for (i, d) in row.chunks_exact_mut(5).take(side.width / 2).enumerate() {
            let u = line.u[i] & 0x3ff;
            let y0 = line.y[2 * i] & 0x3ff;
            let v = line.v[i] & 0x3ff;
            let y1 = line.y[2 * i + 1] & 0x3ff;
            d[0] = (u >> 2) as u8;
            d[1] = ((u & 0x03) << 6 | y0 >> 4) as u8;
            d[2] = ((y0 & 0x0f) << 4 | v >> 6) as u8;
            d[3] = ((v & 0x3f) << 2 | y1 >> 8) as u8;
            d[4] = y1 as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_core::prelude::Resolution;

    #[test]
    fn unpacks_mid_grey_group() {
        let side = FrameSide::new(PixelFormat::Pgroup, Resolution::new(2, 1).unwrap());
        let mut line = YuvLine::new(2);
        Pgroup::unpack_line(&[0x80, 0x04, 0x08, 0x00, 0x40], &side, 0, &mut line);
        assert_eq!(line.u, vec![0x200]);
        assert_eq!(line.y, vec![0x40, 0x40]);
        assert_eq!(line.v, vec![0x200]);
    }

    #[test]
    fn pack_straddles_bytes() {
        let side = FrameSide::new(PixelFormat::Pgroup, Resolution::new(2, 1).unwrap());
        let line = YuvLine {
            y: vec![0x3ff, 0x001],
            u: vec![0x155],
            v: vec![0x2aa],
        };
        let mut out = [0u8; 5];
        Pgroup::pack_line(&mut out, &side, 0, &line);
        assert_eq!(out, [0x55, 0x7f, 0xfa, 0xa8, 0x01]);
        let mut back = YuvLine::new(2);
        Pgroup::unpack_line(&out, &side, 0, &mut back);
        assert_eq!(back, line);
    }
}
