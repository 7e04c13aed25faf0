use std::{fmt, num::NonZeroU32, str::FromStr};

use smallvec::{SmallVec, smallvec};

/// Errors raised while describing formats or validating frame geometry.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{FormatError, PixelFormat};
///
/// let err = "NV12".parse::<PixelFormat>().unwrap_err();
/// assert!(matches!(err, FormatError::UnknownFormat(_)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// No format is registered under the given code.
    #[error("unknown pixel format code {0:?}")]
    UnknownFormat(String),
    /// Width or height was zero.
    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
    /// The format pairs pixels horizontally and cannot represent an odd width.
    #[error("{format} requires an even width, got {width}")]
    OddWidth {
        /// Format being validated.
        format: PixelFormat,
        /// Requested width.
        width: u32,
    },
    /// A separate alpha plane was requested for a format that has none.
    #[error("{0} has no separate alpha plane")]
    AlphaUnsupported(PixelFormat),
}

/// Resolution of a frame.
///
/// # Example
/// ```rust
/// use essence_core::prelude::Resolution;
///
/// let res = Resolution::new(1920, 1080).unwrap();
/// assert_eq!(res.width.get(), 1920);
/// assert!(Resolution::new(0, 1080).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Resolution {
    /// Width in pixels (non-zero).
    pub width: NonZeroU32,
    /// Height in pixels (non-zero).
    pub height: NonZeroU32,
}

impl Resolution {
    /// Create a resolution, returning `None` if width or height are zero.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        Some(Self {
            width: NonZeroU32::new(width)?,
            height: NonZeroU32::new(height)?,
        })
    }

    /// Width as `usize`.
    pub fn w(&self) -> usize {
        self.width.get() as usize
    }

    /// Height as `usize`.
    pub fn h(&self) -> usize {
        self.height.get() as usize
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How samples are arranged in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// All channels interleaved in a single plane.
    Packed,
    /// One plane per channel.
    Planar,
}

/// Chroma sampling of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Chroma halved horizontally.
    Yuv422,
    /// Chroma halved horizontally and vertically.
    Yuv420,
    /// Full resolution RGB, no subsampling.
    Rgb,
}

/// Static description of a pixel format.
///
/// # Example
/// ```rust
/// use essence_core::prelude::{Layout, PixelFormat, Sampling};
///
/// let info = PixelFormat::V210.info();
/// assert_eq!(info.layout, Layout::Packed);
/// assert_eq!(info.sampling, Sampling::Yuv422);
/// assert_eq!(info.group, 6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Packed or planar storage.
    pub layout: Layout,
    /// Chroma sampling.
    pub sampling: Sampling,
    /// Significant bits per channel.
    pub depth: u8,
    /// Alpha is interleaved with the colour channels.
    pub has_alpha: bool,
    /// Words are stored byte-swapped relative to the base layout.
    pub byte_swapped: bool,
    /// Pixels spanned by one macro-pixel group.
    pub group: u32,
    /// A separate alpha plane may follow the colour planes.
    pub alpha_plane: bool,
}

/// Supported pixel formats.
///
/// Codes parse case-sensitively; `4175` is accepted as an alias of `pgroup`.
///
/// # Example
/// ```rust
/// use essence_core::prelude::PixelFormat;
///
/// let fmt: PixelFormat = "BGR10-A-BS".parse().unwrap();
/// assert_eq!(fmt, PixelFormat::Bgr10aBs);
/// assert_eq!(fmt.to_string(), "BGR10-A-BS");
/// assert_eq!("4175".parse::<PixelFormat>().unwrap(), PixelFormat::Pgroup);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PixelFormat {
    /// RFC4175 10-bit 4:2:2, 5 bytes per pixel pair.
    Pgroup,
    /// 10-bit 4:2:2, 16 bytes per 6 pixels.
    V210,
    /// Planar 10-bit 4:2:2 in little-endian 16-bit samples.
    Yuv422p10,
    /// Interleaved 10-bit 4:2:2 in little-endian 16-bit samples.
    Uyvy10,
    /// Planar 8-bit 4:2:0.
    Yuv420p,
    /// 8-bit RGBA bytes.
    Rgba8,
    /// 8-bit BGRA bytes.
    Bgra8,
    /// 10-bit RGB with 2-bit alpha in a little-endian 32-bit word.
    Bgr10a,
    /// Byte-swapped `Bgr10a`.
    Bgr10aBs,
    /// Planar 16-bit G, B, R.
    Gbrp16,
}

impl PixelFormat {
    /// Every supported format.
    pub const ALL: [PixelFormat; 10] = [
        PixelFormat::Pgroup,
        PixelFormat::V210,
        PixelFormat::Yuv422p10,
        PixelFormat::Uyvy10,
        PixelFormat::Yuv420p,
        PixelFormat::Rgba8,
        PixelFormat::Bgra8,
        PixelFormat::Bgr10a,
        PixelFormat::Bgr10aBs,
        PixelFormat::Gbrp16,
    ];

    /// Canonical string code.
    pub const fn code(self) -> &'static str {
        match self {
            PixelFormat::Pgroup => "pgroup",
            PixelFormat::V210 => "v210",
            PixelFormat::Yuv422p10 => "YUV422P10",
            PixelFormat::Uyvy10 => "UYVY10",
            PixelFormat::Yuv420p => "420P",
            PixelFormat::Rgba8 => "RGBA8",
            PixelFormat::Bgra8 => "BGRA8",
            PixelFormat::Bgr10a => "BGR10-A",
            PixelFormat::Bgr10aBs => "BGR10-A-BS",
            PixelFormat::Gbrp16 => "GBRP16",
        }
    }

    /// Static metadata for this format.
    pub const fn info(self) -> FormatInfo {
        const fn info(
            layout: Layout,
            sampling: Sampling,
            depth: u8,
            group: u32,
        ) -> FormatInfo {
            FormatInfo {
                layout,
                sampling,
                depth,
                has_alpha: false,
                byte_swapped: false,
                group,
                alpha_plane: false,
            }
        }
        match self {
            PixelFormat::Pgroup => info(Layout::Packed, Sampling::Yuv422, 10, 2),
            PixelFormat::V210 => info(Layout::Packed, Sampling::Yuv422, 10, 6),
            PixelFormat::Yuv422p10 => FormatInfo {
                alpha_plane: true,
                ..info(Layout::Planar, Sampling::Yuv422, 10, 2)
            },
            PixelFormat::Uyvy10 => info(Layout::Packed, Sampling::Yuv422, 10, 2),
            PixelFormat::Yuv420p => FormatInfo {
                alpha_plane: true,
                ..info(Layout::Planar, Sampling::Yuv420, 8, 2)
            },
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => FormatInfo {
                has_alpha: true,
                ..info(Layout::Packed, Sampling::Rgb, 8, 1)
            },
            PixelFormat::Bgr10a => FormatInfo {
                has_alpha: true,
                ..info(Layout::Packed, Sampling::Rgb, 10, 1)
            },
            PixelFormat::Bgr10aBs => FormatInfo {
                has_alpha: true,
                byte_swapped: true,
                ..info(Layout::Packed, Sampling::Rgb, 10, 1)
            },
            PixelFormat::Gbrp16 => info(Layout::Planar, Sampling::Rgb, 16, 1),
        }
    }

    /// Whether the format belongs to the YUV family.
    pub const fn is_yuv(self) -> bool {
        !matches!(self.info().sampling, Sampling::Rgb)
    }

    /// Whether the format stores all channels in one plane.
    pub const fn is_packed(self) -> bool {
        matches!(self.info().layout, Layout::Packed)
    }

    /// Whether `has_alpha` appends an alpha plane to the layout.
    pub const fn supports_alpha_plane(self) -> bool {
        matches!(self, PixelFormat::Yuv422p10 | PixelFormat::Yuv420p)
    }

    /// Byte stride of one row of the primary plane.
    ///
    /// # Example
    /// ```rust
    /// use essence_core::prelude::PixelFormat;
    ///
    /// assert_eq!(PixelFormat::Pgroup.pitch(1920), 4800);
    /// assert_eq!(PixelFormat::V210.pitch(1920), 5120);
    /// assert_eq!(PixelFormat::V210.pitch(100), 384);
    /// ```
    pub const fn pitch(self, width: u32) -> usize {
        let w = width as usize;
        match self {
            PixelFormat::Pgroup => w * 5 / 2,
            PixelFormat::V210 => w.div_ceil(48) * 128,
            PixelFormat::Yuv422p10 | PixelFormat::Gbrp16 => w * 2,
            PixelFormat::Yuv420p => w,
            PixelFormat::Uyvy10
            | PixelFormat::Rgba8
            | PixelFormat::Bgra8
            | PixelFormat::Bgr10a
            | PixelFormat::Bgr10aBs => w * 4,
        }
    }

    /// Plane layouts, in storage order, for a frame of this format.
    ///
    /// YUV planar formats yield luma, U, V and (when `has_alpha`) alpha.
    /// `GBRP16` yields G, B, R. Packed formats yield a single plane and ignore
    /// `has_alpha`.
    ///
    /// # Example
    /// ```rust
    /// use essence_core::prelude::PixelFormat;
    ///
    /// let planes = PixelFormat::Yuv420p.plane_layouts(4, 4, false);
    /// assert_eq!(planes.len(), 3);
    /// assert_eq!(planes[1].offset, 16);
    /// assert_eq!(planes[1].stride, 2);
    /// ```
    pub fn plane_layouts(self, width: u32, height: u32, has_alpha: bool) -> SmallVec<[PlaneLayout; 4]> {
        let w = width as usize;
        let h = height as usize;
        match self {
            PixelFormat::Yuv422p10 => {
                let mut planes = stacked(&[(w * 2, h), (w, h), (w, h)]);
                if has_alpha {
                    push_plane(&mut planes, w * 2, h);
                }
                planes
            }
            PixelFormat::Yuv420p => {
                let chroma_lines = h.div_ceil(2);
                let mut planes = stacked(&[(w, h), (w / 2, chroma_lines), (w / 2, chroma_lines)]);
                if has_alpha {
                    push_plane(&mut planes, w, h);
                }
                planes
            }
            PixelFormat::Gbrp16 => stacked(&[(w * 2, h), (w * 2, h), (w * 2, h)]),
            packed => {
                let stride = packed.pitch(width);
                smallvec![PlaneLayout {
                    offset: 0,
                    len: stride * h,
                    stride,
                }]
            }
        }
    }

    /// Exact byte count read or written for a full frame.
    ///
    /// `has_alpha` is ignored by formats without a separate alpha plane; the
    /// string-keyed [`required_bytes`] rejects that combination instead.
    ///
    /// # Example
    /// ```rust
    /// use essence_core::prelude::PixelFormat;
    ///
    /// assert_eq!(PixelFormat::Yuv422p10.required_bytes(1920, 1080, false), 1920 * 1080 * 4);
    /// assert_eq!(PixelFormat::Yuv420p.required_bytes(1920, 1080, false), 1920 * 1080 * 3 / 2);
    /// assert_eq!(PixelFormat::Yuv420p.required_bytes(1920, 1080, true), 1920 * 1080 * 5 / 2);
    /// ```
    pub fn required_bytes(self, width: u32, height: u32, has_alpha: bool) -> usize {
        self.plane_layouts(width, height, has_alpha)
            .last()
            .map(|p| p.offset + p.len)
            .unwrap_or(0)
    }

    /// Validate dimensions for this format.
    ///
    /// Width and height must be non-zero; YUV formats need an even width.
    pub fn check_dimensions(self, width: u32, height: u32) -> Result<Resolution, FormatError> {
        let res =
            Resolution::new(width, height).ok_or(FormatError::InvalidDimensions { width, height })?;
        if self.is_yuv() && width % 2 != 0 {
            return Err(FormatError::OddWidth {
                format: self,
                width,
            });
        }
        Ok(res)
    }
}

fn push_plane(planes: &mut SmallVec<[PlaneLayout; 4]>, stride: usize, lines: usize) {
    let offset = planes.last().map(|p| p.offset + p.len).unwrap_or(0);
    planes.push(PlaneLayout {
        offset,
        len: stride * lines,
        stride,
    });
}

fn stacked(dims: &[(usize, usize)]) -> SmallVec<[PlaneLayout; 4]> {
    let mut planes = SmallVec::new();
    for &(stride, lines) in dims {
        push_plane(&mut planes, stride, lines);
    }
    planes
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PixelFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "4175" {
            return Ok(PixelFormat::Pgroup);
        }
        PixelFormat::ALL
            .into_iter()
            .find(|f| f.code() == s)
            .ok_or_else(|| FormatError::UnknownFormat(s.to_string()))
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for PixelFormat {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.code())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for PixelFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let code = <String as serde::Deserialize>::deserialize(deserializer)?;
        code.parse().map_err(serde::de::Error::custom)
    }
}

/// Byte range and stride of one plane inside a frame buffer.
///
/// # Example
/// ```rust
/// use essence_core::prelude::PixelFormat;
///
/// let luma = PixelFormat::Yuv422p10.plane_layouts(8, 2, false)[0];
/// assert_eq!((luma.offset, luma.len, luma.stride), (0, 32, 16));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    /// Byte offset into the owning buffer.
    pub offset: usize,
    /// Length of the plane in bytes.
    pub len: usize,
    /// Stride in bytes.
    pub stride: usize,
}

impl PlaneLayout {
    /// Byte range covered by the plane.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Required byte count for a format given by its string code.
///
/// This is the single oracle used by every buffer-sufficiency check.
///
/// # Example
/// ```rust
/// use essence_core::format::required_bytes;
///
/// assert_eq!(required_bytes("pgroup", 1920, 1080, false).unwrap(), 4800 * 1080);
/// assert!(required_bytes("MJPG", 1920, 1080, false).is_err());
/// ```
pub fn required_bytes(code: &str, width: u32, height: u32, has_alpha: bool) -> Result<usize, FormatError> {
    let format: PixelFormat = code.parse()?;
    if has_alpha && !format.supports_alpha_plane() {
        return Err(FormatError::AlphaUnsupported(format));
    }
    Ok(format.required_bytes(width, height, has_alpha))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for fmt in PixelFormat::ALL {
            assert_eq!(fmt.code().parse::<PixelFormat>().unwrap(), fmt);
        }
        assert!("pGroup".parse::<PixelFormat>().is_err());
    }

    #[test]
    fn packed_sizes() {
        assert_eq!(PixelFormat::Pgroup.required_bytes(1920, 1080, false), 5_184_000);
        assert_eq!(PixelFormat::V210.required_bytes(1920, 1080, false), 5120 * 1080);
        assert_eq!(PixelFormat::V210.required_bytes(1280, 720, false), 3456 * 720);
        assert_eq!(PixelFormat::Uyvy10.required_bytes(1920, 1080, true), 1920 * 4 * 1080);
        assert_eq!(PixelFormat::Bgr10aBs.required_bytes(16, 9, false), 16 * 4 * 9);
        assert_eq!(PixelFormat::Gbrp16.required_bytes(16, 9, false), 16 * 9 * 6);
    }

    #[test]
    fn yuv420p_odd_height_rounds_chroma_up() {
        let planes = PixelFormat::Yuv420p.plane_layouts(4, 3, false);
        assert_eq!(planes[1].len, 2 * 2);
        assert_eq!(PixelFormat::Yuv420p.required_bytes(4, 3, false), 12 + 8);
    }

    #[test]
    fn yuv422p10_alpha_plane() {
        let planes = PixelFormat::Yuv422p10.plane_layouts(8, 2, true);
        assert_eq!(planes.len(), 4);
        assert_eq!(planes[3].offset, 32 + 16 + 16);
        assert_eq!(planes[3].stride, 16);
    }

    #[test]
    fn dimension_rules() {
        assert!(PixelFormat::Pgroup.check_dimensions(1919, 1080).is_err());
        assert!(PixelFormat::Rgba8.check_dimensions(1919, 1080).is_ok());
        assert_eq!(
            PixelFormat::V210.check_dimensions(0, 1080),
            Err(FormatError::InvalidDimensions {
                width: 0,
                height: 1080
            })
        );
    }

    #[test]
    fn alpha_plane_only_for_planar_yuv() {
        assert_eq!(required_bytes("420P", 4, 2, true), Ok(12 + 8));
        assert_eq!(
            required_bytes("v210", 48, 1, true),
            Err(FormatError::AlphaUnsupported(PixelFormat::V210))
        );
        assert_eq!(
            required_bytes("GBRP16", 4, 2, true),
            Err(FormatError::AlphaUnsupported(PixelFormat::Gbrp16))
        );
        assert_eq!(required_bytes("v210", 48, 1, false), Ok(128));
    }
}
