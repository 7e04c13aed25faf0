use std::{fmt, sync::Arc, time::Duration};

use essence_core::prelude::Memory;

use crate::{
    error::FrameError,
    processor::{FrameParams, ProcessData, Processor},
};

pub(crate) type Callback = Box<dyn FnOnce(&Completion) + Send + 'static>;

/// A unit of work travelling controller → worker → controller.
///
/// The job owns its buffer views, so any pins they carry stay alive until
/// the completion callback has returned on the controller.
pub struct Job {
    pub(crate) processor: Option<Arc<dyn Processor>>,
    pub(crate) data: ProcessData,
    pub(crate) callback: Callback,
    pub(crate) seq: u64,
}

impl Job {
    /// Work for `processor` over `inputs`, writing into `output`.
    pub fn new<F>(
        processor: Arc<dyn Processor>,
        inputs: impl IntoIterator<Item = Memory>,
        output: Memory,
        callback: F,
    ) -> Self
    where
        F: FnOnce(&Completion) + Send + 'static,
    {
        Self {
            processor: Some(processor),
            data: ProcessData::new(inputs, Some(output)),
            callback: Box::new(callback),
            seq: 0,
        }
    }

    /// Attach per-job parameters.
    pub fn with_params(mut self, params: FrameParams) -> Self {
        self.data.params = params;
        self
    }

    /// Shutdown request: carries no processor and no buffers.
    pub(crate) fn sentinel<F>(callback: F) -> Self
    where
        F: FnOnce(&Completion) + Send + 'static,
    {
        Self {
            processor: None,
            data: ProcessData::default(),
            callback: Box::new(callback),
            seq: 0,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.processor.is_none()
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("processor", &self.processor.as_ref().map(|p| p.name()))
            .field("inputs", &self.data.inputs.len())
            .field("params", &self.data.params)
            .finish()
    }
}

/// Processed job handed back to the controller.
pub(crate) struct Done {
    pub(crate) callback: Callback,
    pub(crate) completion: Completion,
}

/// Outcome of a job as seen by its completion callback.
///
/// # Example
/// ```rust
/// use std::sync::Arc;
/// use essence::prelude::*;
///
/// let concat = Arc::new(Concater::new("420P", 4, 2).unwrap());
/// let mut worker = Worker::builder().spawn().unwrap();
/// worker.enqueue(Job::new(
///     concat,
///     [Memory::make_new(12)],
///     Memory::make_new(12),
///     |done: &Completion| {
///         assert!(done.is_ok());
///         assert_eq!(done.bytes(), 12);
///     },
/// ));
/// worker.flush();
/// ```
pub struct Completion {
    pub(crate) seq: u64,
    pub(crate) result: Result<u32, FrameError>,
    pub(crate) elapsed: Duration,
    pub(crate) data: ProcessData,
    pub(crate) shutdown: bool,
}

impl Completion {
    /// Position of the job in submission order, starting at zero.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn result(&self) -> &Result<u32, FrameError> {
        &self.result
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Bytes produced; zero when the job failed.
    pub fn bytes(&self) -> u32 {
        *self.result.as_ref().unwrap_or(&0)
    }

    pub fn error(&self) -> Option<&FrameError> {
        self.result.as_ref().err()
    }

    /// Time spent in `process_frame`.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whether this acknowledges a shutdown request.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn inputs(&self) -> &[Memory] {
        &self.data.inputs
    }

    pub fn output(&self) -> Option<&Memory> {
        self.data.output.as_ref()
    }

    /// Bytes written to the destination, clamped to its length.
    pub fn output_bytes(&self) -> &[u8] {
        match self.data.output.as_ref() {
            Some(out) => &out.as_slice()[..(self.bytes() as usize).min(out.len())],
            None => &[],
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("seq", &self.seq)
            .field("result", &self.result)
            .field("elapsed", &self.elapsed)
            .field("shutdown", &self.shutdown)
            .finish()
    }
}
