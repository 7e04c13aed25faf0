//! The single background worker that runs every job of a pipeline.
//!
//! Jobs are processed strictly in submission order. Results travel back
//! through a done queue and are delivered on the controller thread by
//! [`Worker::drain`], which is the only place completion callbacks run.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread::JoinHandle,
    time::{Duration, Instant},
};

use essence_core::prelude::{JobQueue, RecvOutcome, SendOutcome};
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, warn};

use crate::{
    error::{FrameError, SetupError},
    job::{Completion, Done, Job},
    metrics::StageMetrics,
    tunables,
};

const FLUSH_POLL: Duration = Duration::from_millis(50);

/// Lifecycle of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Accepting and processing jobs.
    Running = 0,
    /// The shutdown request was dequeued; waiting for the controller to collect it.
    Draining = 1,
    /// The thread has exited and been joined.
    Stopped = 2,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Running,
            1 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

/// Edge signal that coalesces repeated raises until cleared.
#[derive(Default)]
struct Signal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    fn raise(&self) {
        *self.raised.lock() = true;
        self.cond.notify_all();
    }

    fn clear(&self) {
        *self.raised.lock() = false;
    }

    fn wait_for(&self, timeout: Duration) -> bool {
        let mut raised = self.raised.lock();
        if !*raised {
            let _ = self.cond.wait_for(&mut raised, timeout);
        }
        *raised
    }

    fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
    }
}

type Notifier = Arc<dyn Fn() + Send + Sync>;

struct Shared {
    jobs: JobQueue<Job>,
    done: JobQueue<Done>,
    progress: Signal,
    ack: Signal,
    state: AtomicU8,
    notifier: Option<Notifier>,
    metrics: StageMetrics,
    stages: Mutex<HashMap<&'static str, StageMetrics>>,
    window: usize,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Metrics for the processor called `name`, created on first use.
    fn stage(&self, name: &'static str) -> StageMetrics {
        self.stages
            .lock()
            .entry(name)
            .or_insert_with(|| {
                let metrics = StageMetrics::default();
                metrics.set_window_size(self.window);
                metrics
            })
            .clone()
    }

    fn deliver(&self, done: Done) {
        self.done.enqueue(done);
        self.progress.raise();
        if let Some(notify) = &self.notifier {
            notify();
        }
    }
}

/// Configures and spawns a [`Worker`].
///
/// # Example
/// ```rust
/// use essence::prelude::*;
///
/// let worker = Worker::builder()
///     .thread_name("playout-0")
///     .on_progress(|| {})
///     .spawn()
///     .unwrap();
/// assert_eq!(worker.state(), WorkerState::Running);
/// ```
#[derive(Default)]
pub struct WorkerBuilder {
    thread_name: Option<String>,
    notifier: Option<Notifier>,
}

impl WorkerBuilder {
    /// Name the background thread; defaults to the configured tunable.
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    /// Called on the worker thread each time a result is ready to drain.
    pub fn on_progress<F>(mut self, notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.notifier = Some(Arc::new(notify));
        self
    }

    pub fn spawn(self) -> Result<Worker, SetupError> {
        let tunables = tunables::pipeline_tunables();
        let name = self.thread_name.unwrap_or(tunables.thread_name);
        let metrics = StageMetrics::default();
        metrics.set_window_size(tunables.metrics_window);
        let shared = Arc::new(Shared {
            jobs: JobQueue::new(),
            done: JobQueue::new(),
            progress: Signal::default(),
            ack: Signal::default(),
            state: AtomicU8::new(WorkerState::Running as u8),
            notifier: self.notifier,
            metrics,
            stages: Mutex::new(HashMap::new()),
            window: tunables.metrics_window,
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run(thread_shared))?;
        debug!(thread = %name, "worker spawned");
        Ok(Worker {
            shared,
            handle: Some(handle),
            in_flight: 0,
            next_seq: 0,
            quit_requested: false,
        })
    }
}

/// Controller handle for the pipeline worker thread.
///
/// Every method is meant for the controller thread; completion callbacks run
/// inside [`drain`](Self::drain) on that thread.
///
/// # Example
/// ```rust
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
/// use essence::prelude::*;
///
/// let concat: Arc<dyn Processor> = Arc::new(Concater::new("420P", 2, 2).unwrap());
/// let mut worker = Worker::new().unwrap();
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..3 {
///     let done = Arc::clone(&done);
///     worker.enqueue(Job::new(
///         Arc::clone(&concat),
///         [Memory::make_new(6)],
///         Memory::make_new(6),
///         move |_: &Completion| {
///             done.fetch_add(1, Ordering::Relaxed);
///         },
///     ));
/// }
/// worker.shutdown();
/// assert_eq!(done.load(Ordering::Relaxed), 3);
/// assert_eq!(worker.state(), WorkerState::Stopped);
/// ```
pub struct Worker {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    in_flight: usize,
    next_seq: u64,
    quit_requested: bool,
}

impl Worker {
    /// Spawn a worker with default settings.
    pub fn new() -> Result<Self, SetupError> {
        Self::builder().spawn()
    }

    pub fn builder() -> WorkerBuilder {
        WorkerBuilder::default()
    }

    /// Submit a job, returning the number of jobs now in flight.
    ///
    /// # Panics
    /// If called after [`quit`](Self::quit).
    pub fn enqueue(&mut self, mut job: Job) -> usize {
        assert!(!self.quit_requested, "job submitted after quit");
        assert!(!job.is_sentinel(), "shutdown requests go through quit");
        job.seq = self.next_seq;
        self.next_seq += 1;
        if let SendOutcome::Closed = self.shared.jobs.enqueue(job) {
            panic!("job queue closed while worker running");
        }
        self.in_flight += 1;
        self.in_flight
    }

    /// Request shutdown once every earlier job has completed; `callback`
    /// runs from [`drain`](Self::drain) after all of their callbacks.
    ///
    /// # Panics
    /// If called twice.
    pub fn quit<F>(&mut self, callback: F)
    where
        F: FnOnce(&Completion) + Send + 'static,
    {
        assert!(!self.quit_requested, "quit called twice");
        self.quit_requested = true;
        let mut sentinel = Job::sentinel(callback);
        sentinel.seq = self.next_seq;
        self.next_seq += 1;
        self.shared.jobs.enqueue(sentinel);
        self.shared.jobs.close();
        debug!(in_flight = self.in_flight, "shutdown requested");
    }

    /// Run every completion that is ready, in submission order, without
    /// blocking. Returns how many callbacks ran.
    pub fn drain(&mut self) -> usize {
        self.shared.progress.clear();
        let mut delivered = 0;
        while let RecvOutcome::Data(Done { callback, completion }) = self.shared.done.try_dequeue() {
            let shutdown = completion.is_shutdown();
            callback(&completion);
            // Pins held by the job's buffers go here.
            drop(completion);
            delivered += 1;
            if shutdown {
                self.finish();
                break;
            }
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        delivered
    }

    /// Block until a result is ready to drain or `timeout` elapses.
    pub fn wait_progress(&self, timeout: Duration) -> bool {
        if self.state() == WorkerState::Stopped {
            return false;
        }
        self.shared.progress.wait_for(timeout)
    }

    /// Drain until every submitted job has completed.
    pub fn flush(&mut self) {
        while self.in_flight > 0 && self.state() != WorkerState::Stopped {
            self.wait_progress(FLUSH_POLL);
            self.drain();
        }
    }

    /// Request shutdown if needed and drain until the worker has stopped.
    pub fn shutdown(&mut self) {
        if !self.quit_requested {
            self.quit(|_| {});
        }
        while self.state() != WorkerState::Stopped {
            self.wait_progress(FLUSH_POLL);
            self.drain();
        }
    }

    /// Jobs submitted whose callbacks have not yet run.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// Jobs waiting to be picked up by the worker.
    pub fn queued(&self) -> usize {
        self.shared.jobs.size()
    }

    /// Processing-time statistics across every job this worker ran.
    pub fn metrics(&self) -> &StageMetrics {
        &self.shared.metrics
    }

    /// Statistics for jobs run by the processor named `name`.
    ///
    /// `None` until that processor has handled at least one job.
    pub fn stage_metrics(&self, name: &str) -> Option<StageMetrics> {
        self.shared.stages.lock().get(name).cloned()
    }

    fn finish(&mut self) {
        self.shared.ack.raise();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("worker thread terminated abnormally");
        }
        self.shared.set_state(WorkerState::Stopped);
        debug!("worker stopped");
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("state", &self.state())
            .field("in_flight", &self.in_flight)
            .field("queued", &self.queued())
            .finish()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if std::thread::panicking() {
            // Let the thread exit on its own once it reaches the sentinel.
            if !self.quit_requested {
                self.quit_requested = true;
                self.shared.jobs.enqueue(Job::sentinel(|_| {}));
                self.shared.jobs.close();
            }
            self.shared.ack.raise();
            return;
        }
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn run(shared: Arc<Shared>) {
    debug!("worker started");
    loop {
        let job = match shared.jobs.dequeue() {
            RecvOutcome::Data(job) => job,
            RecvOutcome::Empty => continue,
            RecvOutcome::Closed => break,
        };
        let Job {
            processor,
            mut data,
            callback,
            seq,
        } = job;

        let Some(processor) = processor else {
            shared.set_state(WorkerState::Draining);
            debug!(seq, "shutdown request reached worker");
            shared.deliver(Done {
                callback,
                completion: Completion {
                    seq,
                    result: Ok(0),
                    elapsed: Duration::ZERO,
                    data,
                    shutdown: true,
                },
            });
            shared.ack.wait();
            break;
        };

        let name = processor.name();
        let start = Instant::now();
        let result = match catch_unwind(AssertUnwindSafe(|| processor.process_frame(&mut data))) {
            Ok(result) => result,
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                error!(processor = name, seq, panic = %msg, "processor panicked");
                Err(FrameError::Panicked(msg))
            }
        };
        let elapsed = start.elapsed();
        let stage = shared.stage(name);
        shared.metrics.record(elapsed);
        stage.record(elapsed);
        if result.is_err() {
            shared.metrics.record_failure();
            stage.record_failure();
        }
        match &result {
            Ok(bytes) => debug!(
                processor = name,
                seq,
                bytes,
                elapsed_us = elapsed.as_micros() as u64,
                "frame processed"
            ),
            // Already logged at error level.
            Err(FrameError::Panicked(_)) => {}
            Err(err) => warn!(processor = name, seq, error = %err, "frame failed"),
        }
        shared.deliver(Done {
            callback,
            completion: Completion {
                seq,
                result,
                elapsed,
                data,
                shutdown: false,
            },
        });
    }
    debug!("worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::{ProcessData, Processor};
    use essence_core::prelude::Memory;
    use std::sync::atomic::AtomicUsize;

    struct Fill(u8);

    impl Processor for Fill {
        fn name(&self) -> &'static str {
            "fill"
        }

        fn process_frame(&self, data: &mut ProcessData) -> Result<u32, FrameError> {
            let (_, out) = data.split()?;
            out.as_mut_slice().fill(self.0);
            Ok(out.len() as u32)
        }
    }

    struct Boom;

    impl Processor for Boom {
        fn name(&self) -> &'static str {
            "boom"
        }

        fn process_frame(&self, _: &mut ProcessData) -> Result<u32, FrameError> {
            panic!("kaboom");
        }
    }

    #[test]
    fn enqueue_reports_in_flight() {
        let mut worker = Worker::new().unwrap();
        let fill: Arc<dyn Processor> = Arc::new(Fill(1));
        assert_eq!(worker.enqueue(Job::new(fill.clone(), Vec::new(), Memory::make_new(1), |_| {})), 1);
        assert_eq!(worker.enqueue(Job::new(fill, Vec::new(), Memory::make_new(1), |_| {})), 2);
        worker.flush();
        assert_eq!(worker.in_flight(), 0);
        assert_eq!(worker.metrics().total_samples(), 2);
    }

    #[test]
    fn panic_is_reported_as_frame_error() {
        let mut worker = Worker::new().unwrap();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        worker.enqueue(Job::new(Arc::new(Boom), Vec::new(), Memory::make_new(4), move |done: &Completion| {
            *slot.lock() = Some((done.bytes(), done.error().cloned()));
        }));
        worker.flush();
        let (bytes, err) = seen.lock().take().unwrap();
        assert_eq!(bytes, 0);
        assert_eq!(err, Some(FrameError::Panicked("kaboom".into())));
        assert_eq!(worker.metrics().failures(), 1);
        assert_eq!(worker.state(), WorkerState::Running);
    }

    #[test]
    fn quit_stops_after_drain() {
        let mut worker = Worker::new().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        worker.quit(move |done: &Completion| {
            assert!(done.is_shutdown());
            c.fetch_add(1, Ordering::Relaxed);
        });
        while worker.state() != WorkerState::Stopped {
            worker.wait_progress(Duration::from_millis(20));
            worker.drain();
        }
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(!worker.wait_progress(Duration::from_millis(1)));
    }

    #[test]
    #[should_panic(expected = "quit called twice")]
    fn second_quit_panics() {
        let mut worker = Worker::new().unwrap();
        worker.quit(|_| {});
        worker.quit(|_| {});
    }

    #[test]
    #[should_panic(expected = "job submitted after quit")]
    fn enqueue_after_quit_panics() {
        let mut worker = Worker::new().unwrap();
        worker.quit(|_| {});
        worker.enqueue(Job::new(Arc::new(Fill(0)), Vec::new(), Memory::make_new(1), |_| {}));
    }

    #[test]
    fn progress_notifier_fires() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let mut worker = Worker::builder()
            .on_progress(move || {
                h.fetch_add(1, Ordering::Relaxed);
            })
            .spawn()
            .unwrap();
        worker.enqueue(Job::new(Arc::new(Fill(7)), Vec::new(), Memory::make_new(2), |done: &Completion| {
            assert_eq!(done.output_bytes(), &[7, 7]);
        }));
        worker.shutdown();
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn metrics_are_kept_per_processor() {
        let mut worker = Worker::new().unwrap();
        let fill: Arc<dyn Processor> = Arc::new(Fill(1));
        for _ in 0..3 {
            worker.enqueue(Job::new(Arc::clone(&fill), Vec::new(), Memory::make_new(1), |_| {}));
        }
        worker.enqueue(Job::new(Arc::new(Boom), Vec::new(), Memory::make_new(1), |_| {}));
        worker.flush();

        let fill_stats = worker.stage_metrics("fill").unwrap();
        assert_eq!((fill_stats.total_samples(), fill_stats.failures()), (3, 0));
        let boom_stats = worker.stage_metrics("boom").unwrap();
        assert_eq!((boom_stats.total_samples(), boom_stats.failures()), (1, 1));
        assert_eq!(worker.metrics().total_samples(), 4);
        assert!(worker.stage_metrics("packer").is_none());
    }
}
