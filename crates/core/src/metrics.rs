use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

/// Event tallied by [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Pool lease served from the free list.
    Hit,
    /// Pool lease that found the free list empty.
    Miss,
    /// Fresh scratch allocation.
    Allocation,
    /// Item pushed onto a job queue.
    Enqueued,
    /// Item popped from a job queue.
    Dequeued,
}

impl Counter {
    const COUNT: usize = 5;
}

/// Relaxed event counters shared by pools and job queues.
///
/// # Example
/// ```rust
/// use essence_core::metrics::{Counter, Metrics};
///
/// let metrics = Metrics::default();
/// metrics.bump(Counter::Enqueued);
/// metrics.bump(Counter::Enqueued);
/// metrics.bump(Counter::Dequeued);
/// assert_eq!(metrics.snapshot().backlog(), 1);
/// ```
#[derive(Debug, Default)]
pub struct Metrics([AtomicU64; Counter::COUNT]);

impl Metrics {
    pub fn bump(&self, counter: Counter) {
        self.0[counter as usize].fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.0[counter as usize].load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.get(Counter::Hit),
            misses: self.get(Counter::Miss),
            allocations: self.get(Counter::Allocation),
            enqueued: self.get(Counter::Enqueued),
            dequeued: self.get(Counter::Dequeued),
        }
    }
}

/// Plain values read from [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub allocations: u64,
    pub enqueued: u64,
    pub dequeued: u64,
}

impl MetricsSnapshot {
    /// Items pushed but not yet popped when the snapshot was taken.
    pub fn backlog(&self) -> u64 {
        self.enqueued.saturating_sub(self.dequeued)
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pool {}/{} hit/miss ({} allocs), queue {} in {} out",
            self.hits, self.misses, self.allocations, self.enqueued, self.dequeued
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let metrics = Metrics::default();
        metrics.bump(Counter::Miss);
        metrics.bump(Counter::Allocation);
        metrics.bump(Counter::Hit);
        metrics.bump(Counter::Hit);
        let snap = metrics.snapshot();
        assert_eq!((snap.hits, snap.misses, snap.allocations), (2, 1, 1));
        assert_eq!(snap.backlog(), 0);
        assert_eq!(snap.to_string(), "pool 2/1 hit/miss (1 allocs), queue 0 in 0 out");
    }
}
