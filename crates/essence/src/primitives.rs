//! Geometry and colour values carried in per-frame parameters.

use std::fmt;

/// Pixel coordinate; may be negative to place a source partly off-frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct XY {
    pub x: i32,
    pub y: i32,
}

impl XY {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for XY {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub org: XY,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            org: XY::new(x, y),
            width,
            height,
        }
    }

    /// Intersect with a `width` x `height` frame, returning `(x, y, w, h)`
    /// or `None` when nothing remains.
    pub fn clip(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let x0 = i64::from(self.org.x).clamp(0, width as i64);
        let y0 = i64::from(self.org.y).clamp(0, height as i64);
        let x1 = (i64::from(self.org.x) + i64::from(self.width)).clamp(0, width as i64);
        let y1 = (i64::from(self.org.y) + i64::from(self.height)).clamp(0, height as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as usize, y0 as usize, (x1 - x0) as usize, (y1 - y0) as usize))
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at {}", self.width, self.height, self.org)
    }
}

/// Normalised Y'CbCr colour: `y` in [0, 1], `cb` and `cr` in [-0.5, 0.5].
///
/// # Example
/// ```rust
/// use essence::prelude::Colour;
///
/// let grey = Colour::new(0.5, 0.0, 0.0);
/// assert_eq!(grey.to_video_range(8), [126, 128, 128]);
/// assert_eq!(grey.to_video_range(10), [502, 512, 512]);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Colour {
    pub y: f32,
    pub cb: f32,
    pub cr: f32,
}

impl Colour {
    pub const BLACK: Colour = Colour::new(0.0, 0.0, 0.0);
    pub const WHITE: Colour = Colour::new(1.0, 0.0, 0.0);

    pub const fn new(y: f32, cb: f32, cr: f32) -> Self {
        Self { y, cb, cr }
    }

    /// Quantise into studio-range `[Y, Cb, Cr]` code values at `depth` bits.
    pub fn to_video_range(&self, depth: u32) -> [u16; 3] {
        let scale = if depth > 8 { 4.0 } else { 1.0 };
        let max = if depth > 8 { 1023.0 } else { 255.0 };
        let q = |offset: f32, range: f32, v: f32| -> u16 {
            let v = if v.is_nan() { 0.0 } else { v };
            ((offset + range * v) * scale).round().clamp(0.0, max) as u16
        };
        [
            q(16.0, 219.0, self.y.clamp(0.0, 1.0)),
            q(128.0, 224.0, self.cb.clamp(-0.5, 0.5)),
            q(128.0, 224.0, self.cr.clamp(-0.5, 0.5)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_handles_negative_origin() {
        let rect = Rect::new(-4, 2, 10, 100);
        assert_eq!(rect.clip(8, 6), Some((0, 2, 6, 4)));
        assert_eq!(Rect::new(8, 0, 4, 4).clip(8, 6), None);
    }

    #[test]
    fn extremes_quantise_to_studio_limits() {
        assert_eq!(Colour::BLACK.to_video_range(8), [16, 128, 128]);
        assert_eq!(Colour::WHITE.to_video_range(10), [940, 512, 512]);
        assert_eq!(Colour::new(2.0, -1.0, 0.5).to_video_range(8), [235, 16, 240]);
    }
}
