#![doc = include_str!("../README.md")]

pub mod buffer;
pub mod format;
pub mod memory;
pub mod metrics;
pub mod queue;

pub mod prelude {
    pub use crate::{
        buffer::{BufferLease, BufferPool, BufferPoolMetrics},
        format::{
            FormatError, FormatInfo, Layout, PixelFormat, PlaneLayout, Resolution, Sampling,
            required_bytes,
        },
        memory::{ExternalBacking, HostBuffer, KeepAlive, Memory},
        metrics::{Counter, Metrics, MetricsSnapshot},
        queue::{JobQueue, RecvOutcome, SendOutcome},
    };
}
