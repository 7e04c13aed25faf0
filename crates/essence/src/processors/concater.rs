use essence_core::prelude::PixelFormat;
use tracing::info;

use crate::{
    error::{FrameError, SetupError},
    processor::{ProcessData, Processor},
};

/// Concatenates every source buffer into the destination in order.
///
/// The copy stops at the destination's capacity; the last source that does
/// not fit is truncated and later sources are skipped.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let concat = Concater::new("v210", 1920, 1080).unwrap();
/// assert_eq!(concat.dst_bytes_req(), 5120 * 1080);
/// ```
#[derive(Debug, Clone)]
pub struct Concater {
    format: PixelFormat,
    dst_bytes: usize,
}

impl Concater {
    pub fn new(format: &str, width: u32, height: u32) -> Result<Self, SetupError> {
        let format: PixelFormat = format.parse()?;
        let res = format.check_dimensions(width, height)?;
        if res.w() % 2 != 0 {
            return Err(SetupError::InvalidParameter {
                name: "width",
                reason: format!("{} is not even", res.w()),
            });
        }
        let dst_bytes = format.required_bytes(width, height, false);
        info!(%format, %res, dst_bytes, "concater configured");
        Ok(Self { format, dst_bytes })
    }

    /// Bytes of one frame in the session format.
    pub fn dst_bytes_req(&self) -> usize {
        self.dst_bytes
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}

impl Processor for Concater {
    fn name(&self) -> &'static str {
        "concater"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let (inputs, output) = data.split()?;
        let dst = output.as_mut_slice();
        let mut offset = 0;
        for src in inputs {
            let room = dst.len() - offset;
            if room == 0 {
                break;
            }
            let n = src.len().min(room);
            dst[offset..offset + n].copy_from_slice(&src.as_slice()[..n]);
            offset += n;
        }
        Ok(offset as u32)
    }
}
