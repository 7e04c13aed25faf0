#![doc = include_str!("../README.md")]

pub use essence_codec as codec;
pub use essence_core as core;

pub mod error;
pub mod essence_info;
mod job;
mod metrics;
pub mod primitives;
pub mod processor;
pub mod processors;
pub mod tunables;
pub mod worker;

pub use error::{FrameError, SetupError};
pub use job::{Completion, Job};
pub use metrics::StageMetrics;

pub mod prelude {
    pub use crate::{
        error::{FrameError, SetupError},
        essence_info::{EncodeParams, EssenceInfo, FlipInfo, Interlace},
        job::{Completion, Job},
        metrics::StageMetrics,
        primitives::{Colour, Rect, XY},
        processor::{FrameParams, ProcessData, Processor},
        processors::{Concater, Decoder, Encoder, Flipper, Packer, ScaleConverter, Stamper},
        tunables::{EssenceConfig, PipelineTunables, pipeline_tunables, set_pipeline_tunables},
        worker::{Worker, WorkerBuilder, WorkerState},
    };
    pub use essence_codec::prelude::*;
    pub use essence_core::prelude::*;
}
