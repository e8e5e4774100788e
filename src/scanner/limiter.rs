//! Counting permit pool that bounds how many probes are in flight

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

struct LimiterInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

/// Semaphore-backed limiter. Clones share the same pool.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    inner: Arc<LimiterInner>,
}

impl ConcurrencyLimiter {
    /// Create a pool with `capacity` permits. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(LimiterInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }),
        }
    }

    /// Wait for a free permit. The permit is returned to the pool when the
    /// guard is dropped, on every exit path including unwinding.
    pub async fn acquire(&self) -> crate::Result<ProbePermit> {
        let permit = self
            .inner
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::ScanError::LimiterClosed)?;

        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak.fetch_max(now, Ordering::SeqCst);

        Ok(ProbePermit {
            inner: self.inner.clone(),
            _permit: permit,
        })
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Permits currently held
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of permits held at the same time so far
    pub fn peak(&self) -> usize {
        self.inner.peak.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }
}

impl std::fmt::Debug for ConcurrencyLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiter")
            .field("capacity", &self.capacity())
            .field("in_flight", &self.in_flight())
            .field("peak", &self.peak())
            .finish()
    }
}

/// One unit of limiter capacity
pub struct ProbePermit {
    inner: Arc<LimiterInner>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for ProbePermit {
    fn drop(&mut self) {
        // runs before the semaphore permit field is dropped
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
