use essence_core::prelude::{PixelFormat, Resolution};

use super::{
    line::{FrameSide, YuvLayout, YuvLine},
    pgroup::Pgroup,
    uyvy10::Uyvy10,
    v210::V210,
};
use crate::ConvertError;

type MirrorFn = fn(&FrameSide, &[u8], usize, &mut [u8], usize);

fn mirror_yuv<L: YuvLayout>(side: &FrameSide, src: &[u8], src_y: usize, dst: &mut [u8], dst_y: usize) {
    let mut line = YuvLine::new(side.width);
    L::unpack_line(src, side, src_y, &mut line);
    line.mirror();
    L::pack_line(dst, side, dst_y, &line);
}

fn mirror_rgb32(side: &FrameSide, src: &[u8], src_y: usize, dst: &mut [u8], dst_y: usize) {
    let from = &src[side.line(0, src_y)];
    let to = &mut dst[side.line(0, dst_y)];
    for (d, s) in to.chunks_exact_mut(4).zip(from.chunks_exact(4).rev()) {
        d.copy_from_slice(s);
    }
}

/// Line-order and left-right flips for packed formats.
///
/// Vertical flips reverse whole lines; horizontal flips mirror pixels, keeping
/// each chroma sample attached to its luma pair.
///
/// # Example
/// ```rust
/// use essence_codec::convert::FlipKernel;
/// use essence_core::prelude::PixelFormat;
///
/// let flip = FlipKernel::new(PixelFormat::Rgba8, 2, 2, false, true).unwrap();
/// let src = [1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4];
/// let mut dst = [0u8; 16];
/// flip.apply(&src, &mut dst).unwrap();
/// assert_eq!(dst[..8], [3, 3, 3, 3, 4, 4, 4, 4]);
/// ```
pub struct FlipKernel {
    side: FrameSide,
    horizontal: bool,
    vertical: bool,
    mirror: MirrorFn,
}

impl FlipKernel {
    /// Plan a flip; only packed formats are accepted.
    pub fn new(format: PixelFormat, width: u32, height: u32, horizontal: bool, vertical: bool) -> Result<Self, ConvertError> {
        let res: Resolution = format.check_dimensions(width, height)?;
        let mirror: MirrorFn = match format {
            PixelFormat::Pgroup => mirror_yuv::<Pgroup>,
            PixelFormat::V210 => mirror_yuv::<V210>,
            PixelFormat::Uyvy10 => mirror_yuv::<Uyvy10>,
            PixelFormat::Rgba8 | PixelFormat::Bgra8 | PixelFormat::Bgr10a | PixelFormat::Bgr10aBs => mirror_rgb32,
            other => return Err(ConvertError::UnsupportedFlip(other)),
        };
        Ok(Self {
            side: FrameSide::new(format, res),
            horizontal,
            vertical,
            mirror,
        })
    }

    /// Bytes read and written per frame.
    pub fn frame_bytes(&self) -> usize {
        self.side.bytes
    }

    /// Flip `src` into `dst`, returning the bytes written.
    pub fn apply(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, ConvertError> {
        let bytes = self.side.bytes;
        if src.len() < bytes {
            return Err(ConvertError::SourceTooShort {
                needed: bytes,
                actual: src.len(),
            });
        }
        if dst.len() < bytes {
            return Err(ConvertError::DestinationTooShort {
                needed: bytes,
                actual: dst.len(),
            });
        }
        let height = self.side.height;
        for dst_y in 0..height {
            let src_y = if self.vertical { height - 1 - dst_y } else { dst_y };
            if self.horizontal {
                (self.mirror)(&self.side, src, src_y, dst, dst_y);
            } else {
                dst[self.side.line(0, dst_y)].copy_from_slice(&src[self.side.line(0, src_y)]);
            }
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{Converter, line::read_u32};

    #[test]
    fn planar_formats_rejected() {
        assert!(matches!(
            FlipKernel::new(PixelFormat::Yuv422p10, 4, 4, true, false),
            Err(ConvertError::UnsupportedFlip(PixelFormat::Yuv422p10))
        ));
    }

    #[test]
    fn horizontal_pgroup_mirrors_luma_and_chroma_pairs() {
        let w = 4u32;
        let mut planar = vec![0u8; (w * 4) as usize];
        for (i, y) in [10u16, 20, 30, 40].into_iter().enumerate() {
            planar[i * 2..i * 2 + 2].copy_from_slice(&y.to_le_bytes());
        }
        planar[8..10].copy_from_slice(&100u16.to_le_bytes());
        planar[10..12].copy_from_slice(&200u16.to_le_bytes());
        planar[12..14].copy_from_slice(&300u16.to_le_bytes());
        planar[14..16].copy_from_slice(&400u16.to_le_bytes());

        let to_pg = Converter::new(PixelFormat::Yuv422p10, PixelFormat::Pgroup, w, 1).unwrap();
        let from_pg = Converter::new(PixelFormat::Pgroup, PixelFormat::Yuv422p10, w, 1).unwrap();
        let mut pg = vec![0u8; to_pg.dst_bytes()];
        to_pg.convert(&planar, &mut pg).unwrap();

        let flip = FlipKernel::new(PixelFormat::Pgroup, w, 1, true, false).unwrap();
        let mut flipped = vec![0u8; flip.frame_bytes()];
        flip.apply(&pg, &mut flipped).unwrap();

        let mut back = vec![0u8; from_pg.dst_bytes()];
        from_pg.convert(&flipped, &mut back).unwrap();
        let samples: Vec<u16> = back
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, [40, 30, 20, 10, 200, 100, 400, 300]);
    }

    #[test]
    fn vertical_v210_reverses_lines() {
        let flip = FlipKernel::new(PixelFormat::V210, 6, 3, false, true).unwrap();
        let pitch = PixelFormat::V210.pitch(6);
        let src: Vec<u8> = (0..3).flat_map(|l| vec![l as u8 + 1; pitch]).collect();
        let mut dst = vec![0u8; src.len()];
        assert_eq!(flip.apply(&src, &mut dst).unwrap(), pitch * 3);
        assert!(dst[..pitch].iter().all(|&b| b == 3));
        assert!(dst[2 * pitch..].iter().all(|&b| b == 1));
    }

    #[test]
    fn horizontal_v210_partial_group_mirrors_and_keeps_padding() {
        let width = 100;
        let side = FrameSide::new(PixelFormat::V210, Resolution::new(width as u32, 1).unwrap());
        let mut line = YuvLine::new(width);
        for (i, y) in line.y.iter_mut().enumerate() {
            *y = 64 + i as u16;
        }
        for i in 0..width / 2 {
            line.u[i] = 300 + i as u16;
            line.v[i] = 700 + i as u16;
        }
        let mut src = vec![0u8; side.pitch];
        V210::pack_line(&mut src, &side, 0, &line);

        let flip = FlipKernel::new(PixelFormat::V210, width as u32, 1, true, false).unwrap();
        let mut dst = vec![0xffu8; flip.frame_bytes()];
        flip.apply(&src, &mut dst).unwrap();

        let mut back = YuvLine::new(width);
        V210::unpack_line(&dst, &side, 0, &mut back);
        line.mirror();
        assert_eq!(back, line);
        assert_eq!((back.y[0], back.y[99], back.u[0], back.v[49]), (163, 64, 349, 700));

        // 17 groups cover 102 pixels; the last holds 4, so its top samples
        // and everything past the groups stay zero.
        let last = 16 * 16;
        assert_eq!(read_u32(&dst, last + 8) >> 20, 0);
        assert_eq!(read_u32(&dst, last + 12), 0);
        assert!(dst[17 * 16..].iter().all(|&b| b == 0));
        assert_eq!(dst.len(), 384);
    }
}
