//! Process-wide admission control for engine invocations.
//!
//! The pool is the single gate in front of the OCR engine: no matter how many
//! jobs are in flight, at most `capacity` engine calls execute concurrently.
//! Rendering is deliberately not gated. A capacity of 1 (the default
//! configuration) strictly serializes engine calls.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Bounded pool of engine-concurrency units.
///
/// Clones share the same underlying slots.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

/// Held for the duration of one engine call.
///
/// Dropping the permit returns the slot, on every exit path including engine
/// failure, timeout, and panic unwinds. This is the no-permit-leak guarantee.
pub struct WorkerPermit {
    _permit: OwnedSemaphorePermit,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Wait for a free slot. Ordering between waiters is whatever the
    /// semaphore provides; fairness is not part of the contract.
    pub async fn acquire(&self) -> WorkerPermit {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            // The semaphore is owned by the pool and never closed.
            .expect("worker pool semaphore closed");
        WorkerPermit { _permit: permit }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently free slots; diagnostic only.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_permit_released_on_drop() {
        let pool = WorkerPool::new(1);
        assert_eq!(pool.available(), 1);
        {
            let _permit = pool.acquire().await;
            assert_eq!(pool.available(), 0);
        }
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn test_zero_capacity_clamped_to_one() {
        let pool = WorkerPool::new(0);
        assert_eq!(pool.capacity(), 1);
        let _permit = pool.acquire().await;
    }

    #[tokio::test]
    async fn test_single_worker_serializes() {
        let pool = Arc::new(WorkerPool::new(1));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(tokio::spawn(async move {
                let _permit = pool.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(max_active.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wider_pool_allows_overlap() {
        let pool = Arc::new(WorkerPool::new(4));
        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            handles.push(tokio::spawn(async move {
                let _permit = pool.acquire().await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let observed = max_active.load(Ordering::SeqCst);
        assert!(observed > 1, "expected overlap, saw max {observed}");
        assert!(observed <= 4);
    }

    #[tokio::test]
    async fn test_permit_released_when_holder_panics() {
        let pool = Arc::new(WorkerPool::new(1));
        let pool_clone = Arc::clone(&pool);
        let handle = tokio::spawn(async move {
            let _permit = pool_clone.acquire().await;
            panic!("holder died");
        });
        assert!(handle.await.is_err());

        // Unwinding must have returned the slot.
        let _permit = pool.acquire().await;
        assert_eq!(pool.available(), 0);
    }
}
