use std::sync::atomic::{AtomicU64, Ordering};

use essence_codec::{CompressedFormat, DecoderDriver};
use parking_lot::Mutex;
use tracing::info;

use crate::{
    error::{FrameError, SetupError},
    essence_info::EssenceInfo,
    processor::{ProcessData, Processor, check_destination},
};

/// Decompresses one video stream through a decoder backend.
///
/// The compressed format is fixed for the session; each job carries exactly
/// one compressed payload.
pub struct Decoder {
    format: CompressedFormat,
    dst_bytes: usize,
    driver: Mutex<Box<dyn DecoderDriver>>,
    frame: AtomicU64,
}

impl Decoder {
    pub fn new(format: CompressedFormat, dst: &EssenceInfo, driver: Box<dyn DecoderDriver>) -> Result<Self, SetupError> {
        if !format.is_video() {
            return Err(SetupError::UnsupportedFormat {
                processor: "decoder",
                format: format.to_string(),
            });
        }
        let dst_format = dst.pixel_format()?;
        let produced = driver.output_format();
        if dst_format != produced {
            return Err(SetupError::FormatMismatch {
                src: produced,
                dst: dst_format,
            });
        }
        let res = dst_format.check_dimensions(dst.width, dst.height)?;
        if res.w() % 2 != 0 || res.h() % 2 != 0 {
            return Err(SetupError::InvalidParameter {
                name: "dimensions",
                reason: format!("{res} must be even in both directions"),
            });
        }
        let dst_bytes = driver.bytes_required();
        info!(%format, dst = %dst, driver = %driver.descriptor(), "decoder configured");
        Ok(Self {
            format,
            dst_bytes,
            driver: Mutex::new(driver),
            frame: AtomicU64::new(0),
        })
    }

    pub fn format(&self) -> CompressedFormat {
        self.format
    }

    pub fn dst_bytes_req(&self) -> usize {
        self.dst_bytes
    }
}

impl Processor for Decoder {
    fn name(&self) -> &'static str {
        "decoder"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let (inputs, output) = data.expect_inputs(1)?;
        let src = inputs[0].as_slice();
        let dst = check_destination(output, self.dst_bytes)?;
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let bytes = self.driver.lock().decode_frame(self.format, src, dst, frame)?;
        Ok(bytes.min(dst.len()) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_codec::{CodecDescriptor, CodecError, CodecKind};
    use essence_core::prelude::{Memory, PixelFormat};

    /// Repeats the first payload byte across a 420P frame.
    struct Flood {
        desc: CodecDescriptor,
        bytes: usize,
    }

    impl DecoderDriver for Flood {
        fn descriptor(&self) -> &CodecDescriptor {
            &self.desc
        }

        fn bytes_required(&self) -> usize {
            self.bytes
        }

        fn decode_frame(
            &mut self,
            format: CompressedFormat,
            src: &[u8],
            dst: &mut [u8],
            _frame: u64,
        ) -> Result<usize, CodecError> {
            assert_eq!(format, CompressedFormat::H264);
            let byte = *src.first().ok_or_else(|| CodecError::Codec("empty payload".into()))?;
            dst[..self.bytes].fill(byte);
            Ok(self.bytes)
        }
    }

    fn flood(width: u32, height: u32) -> Box<dyn DecoderDriver> {
        Box::new(Flood {
            desc: CodecDescriptor {
                kind: CodecKind::Decoder,
                name: "flood",
                impl_name: "test",
            },
            bytes: PixelFormat::Yuv420p.required_bytes(width, height, false),
        })
    }

    #[test]
    fn decodes_single_payload() {
        let dst = EssenceInfo::video("420P", 4, 2);
        let decoder = Decoder::new(CompressedFormat::H264, &dst, flood(4, 2)).unwrap();
        let mut payload = Memory::make_new(1);
        payload.as_mut_slice()[0] = 7;
        let mut data = ProcessData::new([payload], Some(Memory::make_new(12)));
        assert_eq!(decoder.process_frame(&mut data).unwrap(), 12);
        assert!(data.output.unwrap().as_slice().iter().all(|&b| b == 7));
    }

    #[test]
    fn setup_rejects_audio_and_wrong_packing() {
        let dst = EssenceInfo::video("420P", 4, 2);
        assert!(matches!(
            Decoder::new(CompressedFormat::Aac, &dst, flood(4, 2)),
            Err(SetupError::UnsupportedFormat { processor: "decoder", .. })
        ));
        let v210 = EssenceInfo::video("v210", 4, 2);
        assert!(matches!(
            Decoder::new(CompressedFormat::H264, &v210, flood(4, 2)),
            Err(SetupError::FormatMismatch { .. })
        ));
        let odd = EssenceInfo::video("420P", 4, 3);
        assert!(Decoder::new(CompressedFormat::H264, &odd, flood(4, 3)).is_err());
    }

    #[test]
    fn two_payloads_are_rejected() {
        let dst = EssenceInfo::video("420P", 4, 2);
        let decoder = Decoder::new(CompressedFormat::H264, &dst, flood(4, 2)).unwrap();
        let mut data = ProcessData::new([Memory::make_new(1), Memory::make_new(1)], Some(Memory::make_new(12)));
        assert_eq!(
            decoder.process_frame(&mut data),
            Err(FrameError::MissingInput {
                expected: 1,
                actual: 2
            })
        );
    }

    #[test]
    fn backend_failure_is_a_frame_error() {
        let dst = EssenceInfo::video("420P", 4, 2);
        let decoder = Decoder::new(CompressedFormat::H264, &dst, flood(4, 2)).unwrap();
        let mut data = ProcessData::new([Memory::make_new(0)], Some(Memory::make_new(12)));
        assert!(matches!(
            decoder.process_frame(&mut data),
            Err(FrameError::Codec(CodecError::Codec(_)))
        ));
    }
}
