//! Session descriptors built from stream tags.
//!
//! Tags arrive as string pairs; missing keys take broadcast defaults and
//! malformed values are configuration errors.

use std::{collections::HashMap, fmt, str::FromStr};

use essence_core::prelude::{PixelFormat, Resolution};

use crate::error::SetupError;

/// Field order of a video essence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Interlace {
    /// Interlaced, top field first.
    #[default]
    Tff,
    /// Interlaced, bottom field first.
    Bff,
    /// Progressive.
    Progressive,
}

impl Interlace {
    pub fn is_interlaced(self) -> bool {
        !matches!(self, Interlace::Progressive)
    }
}

impl FromStr for Interlace {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "tff" => Ok(Interlace::Tff),
            "bff" => Ok(Interlace::Bff),
            "0" | "prog" => Ok(Interlace::Progressive),
            other => Err(invalid("interlace", other)),
        }
    }
}

fn invalid(name: &'static str, value: &str) -> SetupError {
    SetupError::InvalidParameter {
        name,
        reason: format!("unrecognised value {value:?}"),
    }
}

struct Tags(HashMap<String, String>);

impl Tags {
    fn new<I, K, V>(tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self(
            tags.into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
                .filter(|(_, v)| !v.is_empty())
                .collect(),
        )
    }

    fn str_or(&self, key: &str, default: &str) -> String {
        self.0.get(key).cloned().unwrap_or_else(|| default.to_string())
    }

    fn num_or(&self, key: &'static str, default: u32) -> Result<u32, SetupError> {
        match self.0.get(key) {
            Some(v) => v.trim().parse().map_err(|_| invalid(key, v)),
            None => Ok(default),
        }
    }

    fn bool_or(&self, key: &'static str, default: bool) -> Result<bool, SetupError> {
        match self.0.get(key).map(String::as_str) {
            Some("1" | "true") => Ok(true),
            Some("0" | "false") => Ok(false),
            Some(other) => Err(invalid(key, other)),
            None => Ok(default),
        }
    }
}

/// Description of one side of a session: geometry, sampling and packing.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let info = EssenceInfo::from_tags([("width", "1280"), ("height", "720"), ("interlace", "0")]).unwrap();
/// assert_eq!(info.to_string(), "1280x720, P, pgroup");
/// assert_eq!(info.clock_rate, 90_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EssenceInfo {
    /// `video` or `audio`.
    pub format: String,
    pub encoding_name: String,
    pub clock_rate: u32,
    pub width: u32,
    pub height: u32,
    pub sampling: String,
    pub depth: u32,
    pub colorimetry: String,
    pub interlace: Interlace,
    /// Pixel format code, e.g. `pgroup` or `420P`.
    pub packing: String,
    /// Audio channel count; zero for video.
    pub channels: u32,
    /// Planar frames carry a trailing alpha plane.
    pub has_alpha: bool,
}

impl Default for EssenceInfo {
    fn default() -> Self {
        Self {
            format: "video".into(),
            encoding_name: "raw".into(),
            clock_rate: 90_000,
            width: 1920,
            height: 1080,
            sampling: "YCbCr-4:2:2".into(),
            depth: 8,
            colorimetry: "BT709-2".into(),
            interlace: Interlace::Tff,
            packing: "pgroup".into(),
            channels: 0,
            has_alpha: false,
        }
    }
}

impl EssenceInfo {
    /// Video descriptor with the given geometry and packing, other fields default.
    pub fn video(packing: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            packing: packing.into(),
            width,
            height,
            ..Self::default()
        }
    }

    /// Parse from tag pairs; empty values count as missing.
    pub fn from_tags<I, K, V>(tags: I) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = Tags::new(tags);
        let d = Self::default();
        let interlace = match tags.0.get("interlace") {
            Some(v) => v.parse()?,
            None => d.interlace,
        };
        Ok(Self {
            format: tags.str_or("format", &d.format),
            encoding_name: tags.str_or("encodingName", &d.encoding_name),
            clock_rate: tags.num_or("clockRate", d.clock_rate)?,
            width: tags.num_or("width", d.width)?,
            height: tags.num_or("height", d.height)?,
            sampling: tags.str_or("sampling", &d.sampling),
            depth: tags.num_or("depth", d.depth)?,
            colorimetry: tags.str_or("colorimetry", &d.colorimetry),
            interlace,
            packing: tags.str_or("packing", &d.packing),
            channels: tags.num_or("channels", d.channels)?,
            has_alpha: tags.bool_or("hasAlpha", d.has_alpha)?,
        })
    }

    pub fn with_interlace(mut self, interlace: Interlace) -> Self {
        self.interlace = interlace;
        self
    }

    pub fn with_alpha(mut self, has_alpha: bool) -> Self {
        self.has_alpha = has_alpha;
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Whether this describes a video essence.
    pub fn is_video(&self) -> bool {
        self.format == "video"
    }

    /// Resolve the packing code against the format table.
    pub fn pixel_format(&self) -> Result<PixelFormat, SetupError> {
        Ok(self.packing.parse()?)
    }

    /// Validated resolution for the packing.
    pub fn resolution(&self) -> Result<Resolution, SetupError> {
        Ok(self.pixel_format()?.check_dimensions(self.width, self.height)?)
    }

    /// Bytes of one frame in this packing, including the alpha plane if any.
    pub fn frame_bytes(&self) -> Result<usize, SetupError> {
        Ok(self
            .pixel_format()?
            .required_bytes(self.width, self.height, self.has_alpha))
    }
}

impl fmt::Display for EssenceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scan = if self.interlace.is_interlaced() { "I" } else { "P" };
        write!(f, "{}x{}, {scan}, {}", self.width, self.height, self.packing)
    }
}

/// Flip directions applied by the flipper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FlipInfo {
    /// Mirror left to right.
    pub h: bool,
    /// Reverse line order.
    pub v: bool,
}

impl FlipInfo {
    pub fn from_tags<I, K, V>(tags: I) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = Tags::new(tags);
        Ok(Self {
            h: tags.bool_or("h", false)?,
            v: tags.bool_or("v", false)?,
        })
    }
}

impl fmt::Display for FlipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flip h: {}, v: {}", self.h, self.v)
    }
}

/// Encoder session parameters.
///
/// # Example
/// ```rust
/// use essence::prelude::EncodeParams;
///
/// let video = EncodeParams::from_tags(true, [("bitrate", "8000000")]).unwrap();
/// assert_eq!((video.bitrate, video.gop_frames), (8_000_000, 90));
/// assert_eq!(EncodeParams::audio().bitrate, 128_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EncodeParams {
    pub is_video: bool,
    /// Target bits per second.
    pub bitrate: u32,
    /// Frames per group of pictures; zero for audio.
    pub gop_frames: u32,
}

impl EncodeParams {
    pub const fn video() -> Self {
        Self {
            is_video: true,
            bitrate: 5_000_000,
            gop_frames: 90,
        }
    }

    pub const fn audio() -> Self {
        Self {
            is_video: false,
            bitrate: 128_000,
            gop_frames: 0,
        }
    }

    pub fn from_tags<I, K, V>(is_video: bool, tags: I) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = Tags::new(tags);
        let d = if is_video { Self::video() } else { Self::audio() };
        Ok(Self {
            is_video,
            bitrate: tags.num_or("bitrate", d.bitrate)?,
            gop_frames: tags.num_or("gopFrames", d.gop_frames)?,
        })
    }
}

impl fmt::Display for EncodeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_video {
            write!(
                f,
                "video encode, bitrate {}, GOP frames {}",
                self.bitrate, self.gop_frames
            )
        } else {
            write!(f, "audio encode, bitrate {}", self.bitrate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_broadcast_hd() {
        let info = EssenceInfo::from_tags(std::iter::empty::<(&str, &str)>()).unwrap();
        assert_eq!(info, EssenceInfo::default());
        assert_eq!(info.to_string(), "1920x1080, I, pgroup");
        assert_eq!(info.frame_bytes().unwrap(), 4800 * 1080);
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = EssenceInfo::from_tags([("width", "wide")]).unwrap_err();
        assert!(matches!(
            err,
            SetupError::InvalidParameter { name: "width", .. }
        ));
    }

    #[test]
    fn alpha_and_interlace_tags() {
        let info =
            EssenceInfo::from_tags([("packing", "420P"), ("hasAlpha", "true"), ("interlace", "bff")])
                .unwrap();
        assert!(info.has_alpha);
        assert_eq!(info.interlace, Interlace::Bff);
        assert_eq!(info.frame_bytes().unwrap(), 1920 * 1080 * 5 / 2);
    }

    #[test]
    fn flip_tags() {
        let flip = FlipInfo::from_tags([("v", "1")]).unwrap();
        assert_eq!(flip, FlipInfo { h: false, v: true });
        assert!(FlipInfo::from_tags([("h", "yes")]).is_err());
    }
}
