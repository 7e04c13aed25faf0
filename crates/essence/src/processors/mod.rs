//! Concrete processors run by the pipeline worker.

mod concater;
mod decoder;
mod encoder;
mod flipper;
mod packer;
mod scale_converter;
mod stamper;

pub use concater::Concater;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use flipper::Flipper;
pub use packer::Packer;
pub use scale_converter::ScaleConverter;
pub use stamper::Stamper;

use essence_codec::convert::Converter;
use essence_core::prelude::{BufferLease, BufferPool, PixelFormat};

use crate::{
    error::{FrameError, SetupError},
    tunables,
};

/// Repacks a source frame into a backend's input layout using pooled scratch.
pub(crate) struct Staging {
    converter: Converter,
    pool: BufferPool,
}

impl Staging {
    /// `None` when the backend reads the source format directly.
    pub(crate) fn new(src: PixelFormat, dst: PixelFormat, width: u32, height: u32) -> Result<Option<Self>, SetupError> {
        if src == dst {
            return Ok(None);
        }
        let converter = Converter::new(src, dst, width, height)?;
        let pool = BufferPool::with_limits(0, converter.dst_bytes(), tunables::pool_max_free());
        Ok(Some(Self { converter, pool }))
    }

    pub(crate) fn src_bytes(&self) -> usize {
        self.converter.src_bytes()
    }

    pub(crate) fn stage(&self, src: &[u8]) -> Result<BufferLease, FrameError> {
        let mut lease = self.pool.lease_len(self.converter.dst_bytes());
        self.converter.convert(src, lease.as_mut_slice())?;
        Ok(lease)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_format_needs_no_staging() {
        assert!(
            Staging::new(PixelFormat::Yuv420p, PixelFormat::Yuv420p, 16, 16)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn staging_reuses_scratch() {
        let staging = Staging::new(PixelFormat::Pgroup, PixelFormat::Yuv420p, 4, 2)
            .unwrap()
            .unwrap();
        let src = vec![0u8; staging.src_bytes()];
        drop(staging.stage(&src).unwrap());
        let lease = staging.stage(&src).unwrap();
        assert_eq!(lease.len(), 12);
        assert_eq!(staging.pool.metrics().hits(), 1);
    }
}
