//! Counting I/O gate shared by the walker, the indexer and document reads.
//!
//! Wraps [`tokio::sync::Semaphore`], which queues waiters in FIFO order and
//! hands a released permit straight to the oldest waiter. Permits are RAII
//! guards, so they return to the pool on every exit path, including `?`
//! early returns and panics inside the guarded section.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of concurrent directory listings / file reads.
pub const DEFAULT_IO_PERMITS: usize = 20;

/// A cloneable handle to one shared permit pool.
#[derive(Clone, Debug)]
pub struct IoSemaphore {
    inner: Arc<Semaphore>,
    permits: usize,
}

/// A held permit. Dropping it releases the permit.
#[derive(Debug)]
pub struct IoPermit {
    _permit: OwnedSemaphorePermit,
}

impl IoSemaphore {
    /// Create a gate admitting at most `permits` concurrent holders.
    /// A budget of zero is bumped to one so acquisition can never deadlock.
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            inner: Arc::new(Semaphore::new(permits)),
            permits,
        }
    }

    /// Wait for a permit. Returns immediately while permits remain;
    /// otherwise queues behind earlier callers.
    pub async fn acquire(&self) -> IoPermit {
        // The semaphore is never closed, so acquisition cannot fail.
        let permit = match self.inner.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => unreachable!("io semaphore is never closed"),
        };
        IoPermit { _permit: permit }
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.inner.available_permits()
    }

    /// Total budget this gate was created with.
    pub fn capacity(&self) -> usize {
        self.permits
    }
}

impl Default for IoSemaphore {
    fn default() -> Self {
        Self::new(DEFAULT_IO_PERMITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_admits_up_to_capacity_immediately() {
        let sem = IoSemaphore::new(3);
        let _a = sem.acquire().await;
        let _b = sem.acquire().await;
        let _c = sem.acquire().await;
        assert_eq!(sem.available(), 0);
    }

    #[tokio::test]
    async fn test_blocks_when_exhausted() {
        let sem = IoSemaphore::new(1);
        let held = sem.acquire().await;

        let waiter = {
            let sem = sem.clone();
            tokio::spawn(async move {
                let _p = sem.acquire().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(held);
        waiter.await.unwrap();
        assert_eq!(sem.available(), 1);
    }

    #[tokio::test]
    async fn test_waiters_released_in_fifo_order() {
        let sem = IoSemaphore::new(1);
        let held = sem.acquire().await;
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let sem = sem.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _p = sem.acquire().await;
                order.lock().unwrap().push(i);
            }));
            // Make sure waiter i is queued before waiter i + 1.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(held);
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_release_without_waiters_restores_permit() {
        let sem = IoSemaphore::new(1);
        drop(sem.acquire().await);
        assert_eq!(sem.available(), 1);
        let _again = sem.acquire().await;
        assert_eq!(sem.available(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_never_exceeds_capacity() {
        let sem = IoSemaphore::new(2);
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let sem = sem.clone();
            let current = current.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _p = sem.acquire().await;
                let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                current.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(sem.available(), 2);
    }

    #[test]
    fn test_zero_budget_is_bumped() {
        let sem = IoSemaphore::new(0);
        assert_eq!(sem.capacity(), 1);
    }
}
