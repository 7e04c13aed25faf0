use std::sync::Arc;

use parking_lot::Mutex;

use crate::metrics::{Counter, Metrics};

/// Handle to a pooled scratch buffer.
///
/// When dropped, the allocation goes back to the originating pool so the next
/// frame's intermediate conversion can reuse it.
///
/// # Example
/// ```rust
/// use essence_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_limits(1, 1024, 2);
/// let mut lease = pool.lease();
/// lease.resize(16);
/// assert_eq!(lease.len(), 16);
/// ```
pub struct BufferLease {
    pool: Arc<PoolInner>,
    buf: Option<Vec<u8>>,
}

impl BufferLease {
    /// Borrow as an immutable slice.
    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_deref().unwrap_or(&[])
    }

    /// Borrow as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.buf.as_deref_mut().unwrap_or(&mut [])
    }

    /// Current length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Set the length to `len`, zero-filling any newly exposed bytes.
    pub fn resize(&mut self, len: usize) {
        if let Some(buf) = self.buf.as_mut() {
            buf.resize(len, 0);
        }
    }
}

impl Drop for BufferLease {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.recycle(buf);
        }
    }
}

/// Pool of reusable scratch allocations.
///
/// # Example
/// ```rust
/// use essence_core::prelude::BufferPool;
///
/// let pool = BufferPool::with_limits(0, 64, 1);
/// drop(pool.lease());
/// let _again = pool.lease();
/// assert_eq!(pool.metrics().hits(), 1);
/// assert_eq!(pool.metrics().allocations(), 1);
/// ```
#[derive(Clone)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
    metrics: Arc<Metrics>,
}

impl BufferPool {
    /// Create a pool with `capacity` preallocated buffers of `chunk_size`
    /// bytes, retaining at most `max_free` returned buffers.
    pub fn with_limits(capacity: usize, chunk_size: usize, max_free: usize) -> Self {
        let free = (0..capacity).map(|_| vec![0; chunk_size]).collect();
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(free),
                chunk_size,
                max_free,
            }),
            metrics: Arc::new(Metrics::default()),
        }
    }

    /// Acquire a buffer, allocating if the pool is empty.
    ///
    /// A recycled buffer keeps its previous contents up to `chunk_size`;
    /// callers overwrite the span they use.
    pub fn lease(&self) -> BufferLease {
        let buf = self
            .inner
            .free
            .lock()
            .pop()
            .inspect(|_| self.metrics.bump(Counter::Hit))
            .unwrap_or_else(|| {
                self.metrics.bump(Counter::Miss);
                self.metrics.bump(Counter::Allocation);
                vec![0; self.inner.chunk_size]
            });
        BufferLease {
            pool: self.inner.clone(),
            buf: Some(buf),
        }
    }

    /// Acquire a buffer resized to exactly `len` bytes.
    pub fn lease_len(&self, len: usize) -> BufferLease {
        let mut lease = self.lease();
        lease.resize(len);
        lease
    }

    /// Access metrics counters for this pool.
    pub fn metrics(&self) -> BufferPoolMetrics {
        BufferPoolMetrics(self.metrics.clone())
    }
}

struct PoolInner {
    free: Mutex<Vec<Vec<u8>>>,
    chunk_size: usize,
    max_free: usize,
}

impl PoolInner {
    fn recycle(&self, buf: Vec<u8>) {
        let mut free = self.free.lock();
        if free.len() < self.max_free {
            free.push(buf);
        }
    }
}

/// Observability for buffer pool behavior.
#[derive(Clone)]
pub struct BufferPoolMetrics(Arc<Metrics>);

impl BufferPoolMetrics {
    pub fn hits(&self) -> u64 {
        self.0.get(Counter::Hit)
    }

    pub fn misses(&self) -> u64 {
        self.0.get(Counter::Miss)
    }

    pub fn allocations(&self) -> u64 {
        self.0.get(Counter::Allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recycled_buffers_respect_max_free() {
        let pool = BufferPool::with_limits(0, 8, 1);
        let a = pool.lease();
        let b = pool.lease();
        drop(a);
        drop(b);
        assert_eq!(pool.inner.free.lock().len(), 1);
        assert_eq!(pool.metrics().misses(), 2);
    }

    #[test]
    fn lease_len_grows_past_chunk() {
        let pool = BufferPool::with_limits(1, 4, 1);
        let lease = pool.lease_len(10);
        assert_eq!(lease.len(), 10);
        assert!(lease.as_slice().iter().all(|&b| b == 0));
    }
}
