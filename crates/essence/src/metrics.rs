use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use crate::tunables;

/// Rolling timing metrics for a processing stage.
///
/// # Example
/// ```rust
/// use essence::prelude::StageMetrics;
///
/// let metrics = StageMetrics::default();
/// metrics.record(std::time::Duration::from_millis(5));
/// assert_eq!(metrics.total_samples(), 1);
/// assert!(metrics.fps().is_none());
/// ```
#[derive(Default, Clone)]
pub struct StageMetrics {
    inner: Arc<StageState>,
}

#[derive(Default)]
struct StageState {
    count: AtomicU64,
    failures: AtomicU64,
    last_nanos: AtomicU64,
    window: Mutex<WindowState>,
}

struct WindowState {
    samples: VecDeque<(Instant, u64)>,
    max: usize,
}

impl Default for WindowState {
    fn default() -> Self {
        Self {
            samples: VecDeque::new(),
            max: tunables::metrics_window(),
        }
    }
}

impl StageMetrics {
    /// Record a single duration sample.
    pub fn record(&self, dur: Duration) {
        let nanos = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.inner.count.fetch_add(1, Ordering::Relaxed);
        self.inner.last_nanos.store(nanos, Ordering::Relaxed);
        let mut win = self.inner.window.lock();
        win.samples.push_back((Instant::now(), nanos));
        while win.samples.len() > win.max.max(1) {
            win.samples.pop_front();
        }
    }

    /// Count a job that reported an error.
    pub fn record_failure(&self) {
        self.inner.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Change the window size used for rolling averages/fps. Minimum of 1.
    pub fn set_window_size(&self, window: usize) {
        let mut win = self.inner.window.lock();
        win.max = window.max(1);
        while win.samples.len() > win.max {
            win.samples.pop_front();
        }
    }

    /// Samples within the current window.
    pub fn samples(&self) -> u64 {
        self.inner.window.lock().samples.len() as u64
    }

    /// Total samples recorded over the lifetime.
    pub fn total_samples(&self) -> u64 {
        self.inner.count.load(Ordering::Relaxed)
    }

    /// Jobs that failed over the lifetime.
    pub fn failures(&self) -> u64 {
        self.inner.failures.load(Ordering::Relaxed)
    }

    /// Rolling average of samples in milliseconds.
    pub fn avg_millis(&self) -> Option<f64> {
        let win = self.inner.window.lock();
        let count = win.samples.len();
        if count == 0 {
            return None;
        }
        let total: u128 = win.samples.iter().map(|(_, n)| *n as u128).sum();
        Some(total as f64 / 1_000_000.0 / count as f64)
    }

    /// Most recent sample in milliseconds.
    pub fn last_millis(&self) -> Option<f64> {
        match self.inner.last_nanos.load(Ordering::Relaxed) {
            0 => None,
            last => Some(last as f64 / 1_000_000.0),
        }
    }

    /// Rolling FPS based on sample timestamps.
    pub fn fps(&self) -> Option<f64> {
        let win = self.inner.window.lock();
        if win.samples.len() < 2 {
            return None;
        }
        let first = win.samples.front()?.0;
        let last = win.samples.back()?.0;
        let span = last.saturating_duration_since(first).as_secs_f64();
        (span > 0.0).then(|| win.samples.len() as f64 / span)
    }
}

impl std::fmt::Debug for StageMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageMetrics")
            .field("total_samples", &self.total_samples())
            .field("failures", &self.failures())
            .field("avg_millis", &self.avg_millis())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_trims_to_size() {
        let metrics = StageMetrics::default();
        metrics.set_window_size(2);
        for ms in [1, 2, 3] {
            metrics.record(Duration::from_millis(ms));
        }
        assert_eq!(metrics.samples(), 2);
        assert_eq!(metrics.total_samples(), 3);
        let avg = metrics.avg_millis().unwrap();
        assert!((2.4..=2.6).contains(&avg), "{avg}");
        assert!(metrics.last_millis().unwrap() >= 3.0);
    }

    #[test]
    fn clones_share_state() {
        let a = StageMetrics::default();
        let b = a.clone();
        b.record_failure();
        assert_eq!(a.failures(), 1);
        assert_eq!(a.avg_millis(), None);
    }
}
