use essence_codec::convert::Converter;
use tracing::info;

use crate::{
    error::{FrameError, SetupError},
    essence_info::EssenceInfo,
    processor::{ProcessData, Processor, check_destination, check_source},
};

/// Repacks frames between pixel formats of the same geometry.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let src = EssenceInfo::video("pgroup", 1920, 1080);
/// let dst = EssenceInfo::video("v210", 1920, 1080);
/// let packer = Packer::new(&src, &dst).unwrap();
/// assert_eq!(packer.dst_bytes(), 5120 * 1080);
/// ```
pub struct Packer {
    converter: Converter,
}

impl Packer {
    pub fn new(src: &EssenceInfo, dst: &EssenceInfo) -> Result<Self, SetupError> {
        if (src.width, src.height) != (dst.width, dst.height) {
            return Err(SetupError::DimensionMismatch {
                src_width: src.width,
                src_height: src.height,
                dst_width: dst.width,
                dst_height: dst.height,
            });
        }
        let src_format = src.pixel_format()?;
        let dst_format = dst.pixel_format()?;
        dst_format.check_dimensions(dst.width, dst.height)?;
        let converter = Converter::new(src_format, dst_format, src.width, src.height)?;
        info!(src = %src, dst = %dst, unity = converter.is_unity(), "packer configured");
        Ok(Self { converter })
    }

    pub fn src_bytes(&self) -> usize {
        self.converter.src_bytes()
    }

    pub fn dst_bytes(&self) -> usize {
        self.converter.dst_bytes()
    }
}

impl Processor for Packer {
    fn name(&self) -> &'static str {
        "packer"
    }

    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
        let (inputs, output) = data.expect_inputs(1)?;
        let src = check_source(inputs, 0, self.converter.src_bytes())?;
        let dst = check_destination(output, self.converter.dst_bytes())?;
        Ok(self.converter.convert(src, dst)? as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_codec::ConvertError;
    use essence_core::prelude::Memory;

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let src = EssenceInfo::video("pgroup", 1920, 1080);
        let dst = EssenceInfo::video("v210", 1280, 720);
        assert!(matches!(
            Packer::new(&src, &dst),
            Err(SetupError::DimensionMismatch { dst_width: 1280, .. })
        ));
    }

    #[test]
    fn cross_family_is_unsupported() {
        let src = EssenceInfo::video("v210", 64, 4);
        let dst = EssenceInfo::video("RGBA8", 64, 4);
        assert!(matches!(
            Packer::new(&src, &dst),
            Err(SetupError::Convert(ConvertError::UnsupportedPair { .. }))
        ));
    }

    #[test]
    fn unity_packing_copies() {
        let info = EssenceInfo::video("UYVY10", 2, 1);
        let packer = Packer::new(&info, &info).unwrap();
        let mut src = Memory::make_new(8);
        src.as_mut_slice().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let mut data = ProcessData::new([src], Some(Memory::make_new(8)));
        assert_eq!(packer.process_frame(&mut data).unwrap(), 8);
        assert_eq!(data.output.unwrap().as_slice(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn one_byte_short_source_is_rejected() {
        let src = EssenceInfo::video("pgroup", 4, 2);
        let dst = EssenceInfo::video("YUV422P10", 4, 2);
        let packer = Packer::new(&src, &dst).unwrap();
        let mut data = ProcessData::new([Memory::make_new(19)], Some(Memory::make_new(32)));
        assert_eq!(
            packer.process_frame(&mut data),
            Err(FrameError::InsufficientSource {
                index: 0,
                needed: 20,
                actual: 19
            })
        );
    }
}
