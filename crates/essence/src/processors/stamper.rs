//! Wipe, copy, mix and alpha-stamp operations on planar YUV frames.
//!
//! Every operation works plane by plane (Y, U, V, then alpha) and follows
//! the chroma subsampling of the packing: 4:2:2 chroma covers pixel pairs
//! on every line, 4:2:0 chroma covers pixel pairs on line pairs.

use std::ops::Range;

use essence_core::prelude::{PixelFormat, Resolution};
use tracing::info;

use crate::{
    error::{FrameError, SetupError},
    essence_info::EssenceInfo,
    primitives::{Colour, Rect, XY},
    processor::{FrameParams, ProcessData, Processor, check_destination, check_source},
};

#[derive(Debug, Clone, Copy)]
struct Plane {
    offset: usize,
    stride: usize,
    hsub: usize,
    vsub: usize,
}

impl Plane {
    fn at(&self, bps: usize, col: usize, row: usize) -> usize {
        self.offset + row * self.stride + col * bps
    }
}

#[derive(Debug, Clone)]
struct Geometry {
    width: usize,
    height: usize,
    /// Bytes per sample.
    bps: usize,
    depth: u32,
    max: u32,
    colour: [Plane; 3],
    alpha: Option<Plane>,
    colour_bytes: usize,
    bytes: usize,
}

impl Geometry {
    fn new(format: PixelFormat, res: Resolution, has_alpha: bool) -> Self {
        let (width, height) = (res.w() as u32, res.h() as u32);
        let layouts = format.plane_layouts(width, height, has_alpha);
        let (bps, depth, chroma_vsub) = match format {
            PixelFormat::Yuv420p => (1, 8, 2),
            _ => (2, 10, 1),
        };
        let plane = |i: usize, hsub: usize, vsub: usize| Plane {
            offset: layouts[i].offset,
            stride: layouts[i].stride,
            hsub,
            vsub,
        };
        let colour = [plane(0, 1, 1), plane(1, 2, chroma_vsub), plane(2, 2, chroma_vsub)];
        let alpha = (layouts.len() > 3).then(|| plane(3, 1, 1));
        let colour_bytes = layouts[2].offset + layouts[2].len;
        Self {
            width: res.w(),
            height: res.h(),
            bps,
            depth,
            max: (1 << depth) - 1,
            colour,
            alpha,
            colour_bytes,
            bytes: format.required_bytes(width, height, has_alpha),
        }
    }

    fn read(&self, buf: &[u8], at: usize) -> u32 {
        let v = match self.bps {
            1 => u32::from(buf[at]),
            _ => u32::from(u16::from_le_bytes([buf[at], buf[at + 1]])),
        };
        v & self.max
    }

    fn write(&self, buf: &mut [u8], at: usize, value: u32) {
        match self.bps {
            1 => buf[at] = value as u8,
            _ => buf[at..at + 2].copy_from_slice(&(value as u16).to_le_bytes()),
        }
    }

    /// Fill the samples of `plane` covering luma pixels `x..x+w`, lines `y..y+h`.
    fn fill(&self, buf: &mut [u8], plane: &Plane, (x, y, w, h): (usize, usize, usize, usize), value: u32) {
        let cols = x / plane.hsub..(x + w).div_ceil(plane.hsub);
        for row in y / plane.vsub..(y + h).div_ceil(plane.vsub) {
            for col in cols.clone() {
                self.write(buf, plane.at(self.bps, col, row), value);
            }
        }
    }
}

/// Blend `src` over `dst` with coverage `alpha` out of `max`, rounding.
fn composite(src: u32, dst: u32, alpha: u32, max: u32) -> u32 {
    (src * alpha + dst * (max - alpha) + max / 2) / max
}

/// Weighted mean with an 8-bit weight for `b`, rounding.
fn mix(a: u32, b: u32, weight: u32) -> u32 {
    (a * (256 - weight) + b * weight + 128) >> 8
}

/// Region of a source placed at an origin that lands inside the destination.
struct Overlap {
    cols: Range<usize>,
    rows: Range<usize>,
    dx: usize,
    dy: usize,
}

impl Overlap {
    fn new(src: &Geometry, dst: &Geometry, org: XY) -> Option<Self> {
        let (ox, oy) = (i64::from(org.x), i64::from(org.y));
        let x0 = (-ox).max(0);
        let y0 = (-oy).max(0);
        let x1 = (src.width as i64).min(dst.width as i64 - ox);
        let y1 = (src.height as i64).min(dst.height as i64 - oy);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some(Self {
            cols: x0 as usize..x1 as usize,
            rows: y0 as usize..y1 as usize,
            dx: (x0 + ox) as usize,
            dy: (y0 + oy) as usize,
        })
    }

    fn dst_line(&self, sy: usize) -> usize {
        self.dy + (sy - self.rows.start)
    }

    /// Whether chroma at `plane` is written for source line `sy`: once per
    /// destination chroma line, starting with the first visible line.
    fn carries_chroma(&self, plane: &Plane, sy: usize) -> bool {
        plane.vsub == 1 || sy == self.rows.start || self.dst_line(sy) % 2 == 0
    }
}

/// Compositing processor for `420P` and `YUV422P10` frames.
///
/// The operation is chosen per job through [`FrameParams`]:
/// `Wipe`, `Copy`, `Mix` (two sources) and `Stamp` (source with alpha).
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let info = EssenceInfo::video("420P", 4, 2);
/// let stamper = Stamper::new(&info, &info).unwrap();
/// let mut data = ProcessData::new(Vec::new(), Some(Memory::make_new(12))).with_params(
///     FrameParams::Wipe {
///         rect: Rect::new(0, 0, 4, 2),
///         colour: Colour::BLACK,
///     },
/// );
/// assert_eq!(stamper.process_frame(&mut data).unwrap(), 12);
/// let out = data.output.unwrap();
/// assert_eq!(out.as_slice()[..8], [16; 8]);
/// assert_eq!(out.as_slice()[8..], [128; 4]);
/// ```
pub struct Stamper {
    src: Geometry,
    dst: Geometry,
}

impl Stamper {
    pub fn new(src: &EssenceInfo, dst: &EssenceInfo) -> Result<Self, SetupError> {
        let src_format = src.pixel_format()?;
        let dst_format = dst.pixel_format()?;
        if src_format != dst_format {
            return Err(SetupError::FormatMismatch {
                src: src_format,
                dst: dst_format,
            });
        }
        if !matches!(src_format, PixelFormat::Yuv420p | PixelFormat::Yuv422p10) {
            return Err(SetupError::UnsupportedFormat {
                processor: "stamper",
                format: src.packing.clone(),
            });
        }
        let src_res = src_format.check_dimensions(src.width, src.height)?;
        let dst_res = dst_format.check_dimensions(dst.width, dst.height)?;
        info!(src = %src, dst = %dst, src_alpha = src.has_alpha, dst_alpha = dst.has_alpha, "stamper configured");
        Ok(Self {
            src: Geometry::new(src_format, src_res, src.has_alpha),
            dst: Geometry::new(dst_format, dst_res, dst.has_alpha),
        })
    }

    pub fn src_bytes(&self) -> usize {
        self.src.bytes
    }

    pub fn dst_bytes(&self) -> usize {
        self.dst.bytes
    }

    fn wipe(&self, dst: &mut [u8], rect: Rect, colour: Colour) {
        let g = &self.dst;
        let Some(area) = rect.clip(g.width, g.height) else {
            return;
        };
        let values = colour.to_video_range(g.depth);
        for (plane, value) in g.colour.iter().zip(values) {
            g.fill(dst, plane, area, u32::from(value));
        }
        if let Some(alpha) = &g.alpha {
            g.fill(dst, alpha, area, g.max);
        }
    }

    fn copy(&self, src: &[u8], dst: &mut [u8], org: XY) {
        let (s, d) = (&self.src, &self.dst);
        let Some(ov) = Overlap::new(s, d, org) else {
            return;
        };
        for sy in ov.rows.clone() {
            let dy = ov.dst_line(sy);
            for (sp, dp) in s.colour.iter().zip(&d.colour) {
                if !ov.carries_chroma(sp, sy) {
                    continue;
                }
                let from = sp.at(s.bps, ov.cols.start / sp.hsub, sy / sp.vsub);
                let to = sp.at(s.bps, ov.cols.end.div_ceil(sp.hsub), sy / sp.vsub);
                let at = dp.at(d.bps, ov.dx / dp.hsub, dy / dp.vsub);
                dst[at..at + (to - from)].copy_from_slice(&src[from..to]);
            }
            match (&s.alpha, &d.alpha) {
                (Some(sa), Some(da)) => {
                    let from = sa.at(s.bps, ov.cols.start, sy);
                    let to = sa.at(s.bps, ov.cols.end, sy);
                    let at = da.at(d.bps, ov.dx, dy);
                    dst[at..at + (to - from)].copy_from_slice(&src[from..to]);
                }
                (None, Some(da)) => d.fill(dst, da, (ov.dx, dy, ov.cols.len(), 1), d.max),
                _ => {}
            }
        }
    }

    fn stamp(&self, src: &[u8], dst: &mut [u8], org: XY, sa: &Plane) {
        let (s, d) = (&self.src, &self.dst);
        let Some(ov) = Overlap::new(s, d, org) else {
            return;
        };
        for sy in ov.rows.clone() {
            let dy = ov.dst_line(sy);
            for (sp, dp) in s.colour.iter().zip(&d.colour) {
                if !ov.carries_chroma(sp, sy) {
                    continue;
                }
                let first = ov.cols.start / sp.hsub;
                let dst_first = ov.dx / dp.hsub;
                for col in first..ov.cols.end.div_ceil(sp.hsub) {
                    let alpha = s.read(src, sa.at(s.bps, col * sp.hsub, sy));
                    let value = s.read(src, sp.at(s.bps, col, sy / sp.vsub));
                    let at = dp.at(d.bps, dst_first + col - first, dy / dp.vsub);
                    let under = d.read(dst, at);
                    d.write(dst, at, composite(value, under, alpha, d.max));
                }
            }
            if let Some(da) = &d.alpha {
                for sx in ov.cols.clone() {
                    let alpha = s.read(src, sa.at(s.bps, sx, sy));
                    let at = da.at(d.bps, ov.dx + sx - ov.cols.start, dy);
                    let under = d.read(dst, at);
                    d.write(dst, at, composite(d.max, under, alpha, d.max));
                }
            }
        }
    }

    fn mix(&self, a: &[u8], b: &[u8], dst: &mut [u8], pressure: f32) -> Result<(), FrameError> {
        let (s, d) = (&self.src, &self.dst);
        if !(0.0..=1.0).contains(&pressure) {
            return Err(FrameError::InvalidParams(format!(
                "mix pressure {pressure} outside [0, 1]"
            )));
        }
        if (s.width, s.height) != (d.width, d.height) {
            return Err(FrameError::InvalidParams(format!(
                "mix needs equal geometry, got {}x{} into {}x{}",
                s.width, s.height, d.width, d.height
            )));
        }
        let weight = (pressure * 256.0).round() as u32;
        let mut blend = |range: Range<usize>| {
            for at in range.step_by(d.bps) {
                d.write(dst, at, mix(s.read(a, at), s.read(b, at), weight));
            }
        };
        blend(0..d.colour_bytes);
        match (&s.alpha, &d.alpha) {
            (Some(_), Some(_)) => blend(d.colour_bytes..d.bytes),
            (None, Some(da)) => d.fill(dst, da, (0, 0, d.width, d.height), d.max),
            _ => {}
        }
        Ok(())
    }
}

fn even_origin(org: XY) -> Result<(), FrameError> {
    if org.x % 2 != 0 {
        return Err(FrameError::InvalidParams(format!(
            "origin x {} must be even",
            org.x
        )));
    }
    Ok(())
}

impl Processor for Stamper {
    fn name(&self) -> &'static str {
        "stamper"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let params = data.params;
        let (inputs, output) = data.split()?;
        let dst = check_destination(output, self.dst.bytes)?;
        match params {
            FrameParams::Wipe { rect, colour } => self.wipe(dst, rect, colour),
            FrameParams::Copy { dst_org } => {
                even_origin(dst_org)?;
                let src = check_source(inputs, 0, self.src.bytes)?;
                self.copy(src, dst, dst_org);
            }
            FrameParams::Stamp { dst_org } => {
                even_origin(dst_org)?;
                let alpha = self.src.alpha.ok_or_else(|| {
                    FrameError::InvalidParams("stamp needs a source with alpha".into())
                })?;
                let src = check_source(inputs, 0, self.src.bytes)?;
                self.stamp(src, dst, dst_org, &alpha);
            }
            FrameParams::Mix { pressure } => {
                if inputs.len() != 2 {
                    return Err(FrameError::MissingInput {
                        expected: 2,
                        actual: inputs.len(),
                    });
                }
                let a = check_source(inputs, 0, self.src.bytes)?;
                let b = check_source(inputs, 1, self.src.bytes)?;
                self.mix(a, b, dst, pressure)?;
            }
            FrameParams::None => {
                return Err(FrameError::InvalidParams("no stamper operation selected".into()));
            }
        }
        Ok(self.dst.bytes as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_core::prelude::Memory;

    fn filled(len: usize, byte: u8) -> Memory {
        let mut m = Memory::make_new(len);
        m.as_mut_slice().fill(byte);
        m
    }

    fn samples10(buf: &[u8]) -> Vec<u16> {
        buf.chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    fn frame10(len: usize, value: u16) -> Memory {
        let mut m = Memory::make_new(len);
        for s in m.as_mut_slice().chunks_exact_mut(2) {
            s.copy_from_slice(&value.to_le_bytes());
        }
        m
    }

    #[test]
    fn setup_rejects_mismatched_and_unsupported_packing() {
        let a = EssenceInfo::video("420P", 8, 8);
        let b = EssenceInfo::video("YUV422P10", 8, 8);
        assert!(matches!(
            Stamper::new(&a, &b),
            Err(SetupError::FormatMismatch { .. })
        ));
        let v = EssenceInfo::video("v210", 8, 8);
        assert!(matches!(
            Stamper::new(&v, &v),
            Err(SetupError::UnsupportedFormat { processor: "stamper", .. })
        ));
    }

    #[test]
    fn wipe_clips_and_subsamples_chroma() {
        let info = EssenceInfo::video("420P", 4, 4);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new(Vec::new(), Some(filled(24, 0))).with_params(FrameParams::Wipe {
            rect: Rect::new(2, 2, 10, 10),
            colour: Colour::new(1.0, 0.5, -0.5),
        });
        stamper.process_frame(&mut data).unwrap();
        let out = data.output.unwrap();
        let y = &out.as_slice()[..16];
        assert_eq!(y[10..12], [235, 235]);
        assert_eq!(y[14..16], [235, 235]);
        assert_eq!(y[..10].iter().filter(|&&v| v != 0).count(), 0);
        // U plane is 2x2 at offset 16; only the bottom-right sample is covered.
        assert_eq!(out.as_slice()[16..20], [0, 0, 0, 240]);
        assert_eq!(out.as_slice()[20..24], [0, 0, 0, 16]);
    }

    #[test]
    fn wipe_fills_alpha_opaque() {
        let info = EssenceInfo::video("YUV422P10", 2, 1).with_alpha(true);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new(Vec::new(), Some(Memory::make_new(12))).with_params(FrameParams::Wipe {
            rect: Rect::new(0, 0, 2, 1),
            colour: Colour::new(0.5, 0.0, 0.0),
        });
        stamper.process_frame(&mut data).unwrap();
        assert_eq!(samples10(data.output.unwrap().as_slice()), [502, 502, 512, 512, 1023, 1023]);
    }

    #[test]
    fn copy_places_source_at_origin() {
        let src = EssenceInfo::video("420P", 2, 2);
        let dst = EssenceInfo::video("420P", 4, 4);
        let stamper = Stamper::new(&src, &dst).unwrap();
        let mut data = ProcessData::new([filled(6, 9)], Some(filled(24, 0)))
            .with_params(FrameParams::Copy { dst_org: XY::new(2, 2) });
        assert_eq!(stamper.process_frame(&mut data).unwrap(), 24);
        let out = data.output.unwrap();
        let o = out.as_slice();
        assert_eq!(o[..10], [0; 10]);
        assert_eq!(o[10..12], [9, 9]);
        assert_eq!(o[14..16], [9, 9]);
        assert_eq!(o[16..20], [0, 0, 0, 9]);
    }

    #[test]
    fn copy_clips_negative_origin() {
        let info = EssenceInfo::video("YUV422P10", 4, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut src = Memory::make_new(32);
        for (i, s) in src.as_mut_slice()[..16].chunks_exact_mut(2).enumerate() {
            s.copy_from_slice(&(i as u16 + 1).to_le_bytes());
        }
        let mut data = ProcessData::new([src], Some(Memory::make_new(32)))
            .with_params(FrameParams::Copy { dst_org: XY::new(-2, -1) });
        stamper.process_frame(&mut data).unwrap();
        let y = samples10(&data.output.unwrap().as_slice()[..16]);
        assert_eq!(y, [7, 8, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn odd_origin_is_rejected() {
        let info = EssenceInfo::video("420P", 4, 4);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([filled(24, 1)], Some(filled(24, 0)))
            .with_params(FrameParams::Copy { dst_org: XY::new(1, 0) });
        assert!(matches!(
            stamper.process_frame(&mut data),
            Err(FrameError::InvalidParams(_))
        ));
        assert!(data.output.unwrap().as_slice().iter().all(|&b| b == 0));
    }

    #[test]
    fn mix_rounds_to_midpoint() {
        let info = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([filled(6, 112), filled(6, 144)], Some(filled(6, 0)))
            .with_params(FrameParams::Mix { pressure: 0.5 });
        stamper.process_frame(&mut data).unwrap();
        assert_eq!(data.output.unwrap().as_slice(), &[128; 6]);

        let info = EssenceInfo::video("YUV422P10", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([frame10(16, 448), frame10(16, 576)], Some(Memory::make_new(16)))
            .with_params(FrameParams::Mix { pressure: 0.5 });
        stamper.process_frame(&mut data).unwrap();
        assert_eq!(samples10(data.output.unwrap().as_slice()), [512; 8]);
    }

    #[test]
    fn mix_uses_quantised_weight() {
        // w = round(0.35 * 256) = 90, (138 * 90 + 128) >> 8 = 49 where 138 * 0.35 = 48.3.
        let info = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([filled(6, 0), filled(6, 138)], Some(filled(6, 0)))
            .with_params(FrameParams::Mix { pressure: 0.35 });
        stamper.process_frame(&mut data).unwrap();
        assert_eq!(data.output.unwrap().as_slice(), &[49; 6]);
    }

    #[test]
    fn mix_extremes_select_one_source() {
        let info = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        for (pressure, expected) in [(0.0, 10u8), (1.0, 200u8)] {
            let mut data = ProcessData::new([filled(6, 10), filled(6, 200)], Some(filled(6, 0)))
                .with_params(FrameParams::Mix { pressure });
            stamper.process_frame(&mut data).unwrap();
            assert!(data.output.unwrap().as_slice().iter().all(|&b| b == expected));
        }
    }

    #[test]
    fn mix_rejects_bad_pressure_and_missing_source() {
        let info = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([filled(6, 0), filled(6, 0)], Some(filled(6, 0)))
            .with_params(FrameParams::Mix { pressure: f32::NAN });
        assert!(matches!(
            stamper.process_frame(&mut data),
            Err(FrameError::InvalidParams(_))
        ));
        let mut data = ProcessData::new([filled(6, 0)], Some(filled(6, 0)))
            .with_params(FrameParams::Mix { pressure: 0.5 });
        assert_eq!(
            stamper.process_frame(&mut data),
            Err(FrameError::MissingInput {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn stamp_blends_by_alpha() {
        let src = EssenceInfo::video("420P", 2, 2).with_alpha(true);
        let dst = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&src, &dst).unwrap();
        // Y = 200, U = V = 100, alpha: left column opaque, right column clear.
        let mut frame = Memory::make_new(10);
        let f = frame.as_mut_slice();
        f[..4].fill(200);
        f[4..6].fill(100);
        f[6..10].copy_from_slice(&[255, 0, 255, 0]);
        let mut data = ProcessData::new([frame], Some(filled(6, 50)))
            .with_params(FrameParams::Stamp { dst_org: XY::new(0, 0) });
        stamper.process_frame(&mut data).unwrap();
        assert_eq!(data.output.unwrap().as_slice(), &[200, 50, 200, 50, 100, 100]);
    }

    #[test]
    fn stamp_without_source_alpha_is_rejected() {
        let info = EssenceInfo::video("420P", 2, 2);
        let stamper = Stamper::new(&info, &info).unwrap();
        let mut data = ProcessData::new([filled(6, 0)], Some(filled(6, 0)))
            .with_params(FrameParams::Stamp { dst_org: XY::default() });
        assert!(matches!(
            stamper.process_frame(&mut data),
            Err(FrameError::InvalidParams(_))
        ));
    }

    #[test]
    fn composite_rounds() {
        assert_eq!(composite(1023, 0, 512, 1023), 512);
        assert_eq!(composite(255, 0, 0, 255), 0);
        assert_eq!(composite(100, 40, 255, 255), 100);
    }

    /// 4x2 420P source: luma 1..=8, one chroma row, optional opaque alpha.
    fn small_420p(alpha: bool) -> Memory {
        let mut frame = Memory::make_new(if alpha { 20 } else { 12 });
        let buf = frame.as_mut_slice();
        for (i, y) in buf[..8].iter_mut().enumerate() {
            *y = i as u8 + 1;
        }
        buf[8..12].copy_from_slice(&[40, 41, 60, 61]);
        if alpha {
            buf[12..].fill(255);
        }
        frame
    }

    #[test]
    fn odd_origin_line_shares_chroma_rows_420p() {
        let dst = EssenceInfo::video("420P", 4, 6);
        for (alpha, params) in [
            (false, FrameParams::Copy { dst_org: XY { x: 0, y: 1 } }),
            (true, FrameParams::Stamp { dst_org: XY { x: 0, y: 1 } }),
        ] {
            let src = EssenceInfo::video("420P", 4, 2).with_alpha(alpha);
            let stamper = Stamper::new(&src, &dst).unwrap();
            let mut data = ProcessData::new([small_420p(alpha)], Some(filled(36, 0))).with_params(params);
            assert_eq!(stamper.process_frame(&mut data).unwrap(), 36);
            let out = data.output.unwrap();
            let out = out.as_slice();
            // Source lines land on destination lines 1 and 2.
            assert_eq!(out[..4], [0; 4], "{params}");
            assert_eq!(out[4..12], [1, 2, 3, 4, 5, 6, 7, 8], "{params}");
            assert_eq!(out[12..24], [0; 12], "{params}");
            // Line 1 pairs with line 0 (chroma row 0); line 2 opens chroma
            // row 1; chroma row 2 stays untouched.
            assert_eq!(out[24..30], [40, 41, 40, 41, 0, 0], "{params}");
            assert_eq!(out[30..36], [60, 61, 60, 61, 0, 0], "{params}");
        }
    }
}
