use std::fmt;

use essence_core::prelude::Memory;
use smallvec::SmallVec;

use crate::{
    error::FrameError,
    primitives::{Colour, Rect, XY},
};

/// Per-job operation parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FrameParams {
    /// The processor's fixed session behaviour.
    #[default]
    None,
    /// Copy the source into the destination at `dst_org`.
    Copy { dst_org: XY },
    /// Fill `rect` of the destination with `colour`.
    Wipe { rect: Rect, colour: Colour },
    /// Blend two sources; `pressure` 0 yields the first, 1 the second.
    Mix { pressure: f32 },
    /// Alpha-composite the source onto the destination at `dst_org`.
    Stamp { dst_org: XY },
}

impl fmt::Display for FrameParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameParams::None => f.write_str("none"),
            FrameParams::Copy { dst_org } => write!(f, "copy to {dst_org}"),
            FrameParams::Wipe { rect, .. } => write!(f, "wipe {rect}"),
            FrameParams::Mix { pressure } => write!(f, "mix {pressure}"),
            FrameParams::Stamp { dst_org } => write!(f, "stamp at {dst_org}"),
        }
    }
}

/// Buffers and parameters of one job as seen by a processor.
#[derive(Debug, Default)]
pub struct ProcessData {
    pub inputs: SmallVec<[Memory; 2]>,
    pub output: Option<Memory>,
    pub params: FrameParams,
}

impl ProcessData {
    pub fn new(inputs: impl IntoIterator<Item = Memory>, output: Option<Memory>) -> Self {
        Self {
            inputs: inputs.into_iter().collect(),
            output,
            params: FrameParams::None,
        }
    }

    pub fn with_params(mut self, params: FrameParams) -> Self {
        self.params = params;
        self
    }

    /// Borrow the sources and the destination together.
    pub fn split(&mut self) -> Result<(&[Memory], &mut Memory), FrameError> {
        let out = self.output.as_mut().ok_or(FrameError::MissingOutput)?;
        Ok((&self.inputs, out))
    }

    /// Borrow exactly `count` sources and the destination.
    pub fn expect_inputs(&mut self, count: usize) -> Result<(&[Memory], &mut Memory), FrameError> {
        if self.inputs.len() != count {
            return Err(FrameError::MissingInput {
                expected: count,
                actual: self.inputs.len(),
            });
        }
        self.split()
    }
}

/// Check that source `index` holds at least `needed` bytes.
pub(crate) fn check_source(inputs: &[Memory], index: usize, needed: usize) -> Result<&[u8], FrameError> {
    let src = inputs.get(index).ok_or(FrameError::MissingInput {
        expected: index + 1,
        actual: inputs.len(),
    })?;
    if src.len() < needed {
        return Err(FrameError::InsufficientSource {
            index,
            needed,
            actual: src.len(),
        });
    }
    Ok(src.as_slice())
}

/// Check that the destination holds at least `needed` bytes.
pub(crate) fn check_destination(output: &mut Memory, needed: usize) -> Result<&mut [u8], FrameError> {
    if output.len() < needed {
        return Err(FrameError::InsufficientDestination {
            needed,
            actual: output.len(),
        });
    }
    Ok(output.as_mut_slice())
}

/// One stage of frame work, run only on the pipeline worker.
///
/// Setup is done in the constructor and is immutable afterwards; state that
/// changes per frame (frame counters, backend handles) lives behind interior
/// mutability.
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// struct Zero;
///
/// impl Processor for Zero {
///     fn name(&self) -> &'static str {
///         "zero"
///     }
///
///     fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
///         let (_, out) = data.split()?;
///         out.as_mut_slice().fill(0);
///         Ok(out.len() as u32)
///     }
/// }
///
/// let mut data = ProcessData::new(Vec::new(), Some(Memory::make_new(8)));
/// assert_eq!(Zero.process_frame(&mut data).unwrap(), 8);
/// ```
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Process one job, returning the number of destination bytes produced.
    fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError>;
}
