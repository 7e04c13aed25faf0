use std::sync::atomic::{AtomicU64, Ordering};

use essence_codec::ScalerDriver;
use essence_core::prelude::PixelFormat;
use parking_lot::Mutex;
use tracing::info;

use super::Staging;
use crate::{
    error::{FrameError, SetupError},
    essence_info::EssenceInfo,
    processor::{ProcessData, Processor, check_destination, check_source},
};

/// Resizes frames through a scaler backend.
///
/// The source is first repacked into the backend's working format when the
/// two differ.
pub struct ScaleConverter {
    staging: Option<Staging>,
    src_bytes: usize,
    dst_bytes: usize,
    driver: Mutex<Box<dyn ScalerDriver>>,
    frame: AtomicU64,
}

impl ScaleConverter {
    pub fn new(src: &EssenceInfo, dst: &EssenceInfo, driver: Box<dyn ScalerDriver>) -> Result<Self, SetupError> {
        let src_format: PixelFormat = src.pixel_format()?;
        src_format.check_dimensions(src.width, src.height)?;
        let dst_res = dst.pixel_format()?.check_dimensions(dst.width, dst.height)?;
        if dst_res.w() % 2 != 0 {
            return Err(SetupError::InvalidParameter {
                name: "width",
                reason: format!("destination width {} is not even", dst_res.w()),
            });
        }
        let staging = Staging::new(src_format, driver.working_format(), src.width, src.height)?;
        let src_bytes = staging
            .as_ref()
            .map(Staging::src_bytes)
            .unwrap_or_else(|| src_format.required_bytes(src.width, src.height, src.has_alpha));
        let dst_bytes = driver.bytes_required();
        info!(
            src = %src,
            dst = %dst,
            driver = %driver.descriptor(),
            working = %driver.working_format(),
            "scale converter configured"
        );
        Ok(Self {
            staging,
            src_bytes,
            dst_bytes,
            driver: Mutex::new(driver),
            frame: AtomicU64::new(0),
        })
    }

    pub fn dst_bytes(&self) -> usize {
        self.dst_bytes
    }
}

impl Processor for ScaleConverter {
    fn name(&self) -> &'static str {
        "scale_converter"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let (inputs, output) = data.expect_inputs(1)?;
        let src = check_source(inputs, 0, self.src_bytes)?;
        let dst = check_destination(output, self.dst_bytes)?;
        let staged = self.staging.as_ref().map(|s| s.stage(src)).transpose()?;
        let input = staged.as_ref().map_or(src, |lease| lease.as_slice());
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let bytes = self.driver.lock().scale_convert_frame(input, dst, frame)?;
        Ok(bytes.min(dst.len()) as u32)
    }
}
