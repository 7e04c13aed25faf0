use essence_codec::convert::FlipKernel;
use tracing::info;

use crate::{
    error::{FrameError, SetupError},
    essence_info::{EssenceInfo, FlipInfo},
    processor::{ProcessData, Processor, check_destination, check_source},
};

/// Mirrors frames left-right and/or reverses their line order.
///
/// Only packed formats are accepted. Vertical flips reverse whole frame
/// lines and do not account for field order.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let info = EssenceInfo::video("420P", 1920, 1080);
/// assert!(Flipper::new(&info, FlipInfo { h: true, v: false }).is_err());
/// ```
pub struct Flipper {
    kernel: FlipKernel,
}

impl Flipper {
    pub fn new(info: &EssenceInfo, flip: FlipInfo) -> Result<Self, SetupError> {
        let format = info.pixel_format()?;
        let kernel = FlipKernel::new(format, info.width, info.height, flip.h, flip.v)?;
        info!(essence = %info, %flip, "flipper configured");
        Ok(Self { kernel })
    }

    pub fn frame_bytes(&self) -> usize {
        self.kernel.frame_bytes()
    }
}

impl Processor for Flipper {
    fn name(&self) -> &'static str {
        "flipper"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let bytes = self.kernel.frame_bytes();
        let (inputs, output) = data.expect_inputs(1)?;
        let src = check_source(inputs, 0, bytes)?;
        let dst = check_destination(output, bytes)?;
        Ok(self.kernel.apply(src, dst)? as u32)
    }
}
