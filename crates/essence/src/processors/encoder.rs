use std::sync::atomic::{AtomicU64, Ordering};

use essence_codec::{CodecError, EncoderDriver};
use parking_lot::Mutex;
use tracing::info;

use super::Staging;
use crate::{
    error::{FrameError, SetupError},
    essence_info::{EncodeParams, EssenceInfo},
    processor::{ProcessData, Processor, check_destination, check_source},
};

/// Compresses raw frames through an encoder backend.
///
/// Video frames are repacked into the backend's required layout when the
/// session packing differs; audio blocks go to the backend untouched.
pub struct Encoder {
    staging: Option<Staging>,
    src_bytes: usize,
    dst_bytes: usize,
    params: EncodeParams,
    driver: Mutex<Box<dyn EncoderDriver>>,
    frame: AtomicU64,
}

impl Encoder {
    pub fn new(src: &EssenceInfo, params: EncodeParams, driver: Box<dyn EncoderDriver>) -> Result<Self, SetupError> {
        let (staging, src_bytes) = if params.is_video {
            let src_format = src.pixel_format()?;
            src_format.check_dimensions(src.width, src.height)?;
            let staging = Staging::new(src_format, driver.packing_required(), src.width, src.height)?;
            let src_bytes = match &staging {
                Some(staging) => staging.src_bytes(),
                None => src.frame_bytes()?,
            };
            (staging, src_bytes)
        } else {
            // Audio blocks are passed through at whatever length they arrive.
            (None, 0)
        };
        let dst_bytes = driver.bytes_required();
        info!(
            src = %src,
            dst_bytes,
            driver = %driver.descriptor(),
            params = %params,
            "encoder configured"
        );
        Ok(Self {
            staging,
            src_bytes,
            dst_bytes,
            params,
            driver: Mutex::new(driver),
            frame: AtomicU64::new(0),
        })
    }

    /// Upper bound on one compressed frame.
    pub fn dst_bytes_req(&self) -> usize {
        self.dst_bytes
    }

    pub fn params(&self) -> EncodeParams {
        self.params
    }
}

impl Processor for Encoder {
    fn name(&self) -> &'static str {
        "encoder"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let (inputs, output) = data.expect_inputs(1)?;
        let src = check_source(inputs, 0, self.src_bytes)?;
        let dst = check_destination(output, self.dst_bytes)?;
        let staged = self.staging.as_ref().map(|s| s.stage(src)).transpose()?;
        let input = staged.as_ref().map_or(src, |lease| lease.as_slice());
        let mut driver = self.driver.lock();
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let bytes = match driver.encode_frame(input, dst, frame) {
            // Frame accepted, packet still buffered in the backend.
            Err(CodecError::Backpressure) => 0,
            other => other?,
        };
        Ok(bytes.min(dst.len()) as u32)
    }
}
