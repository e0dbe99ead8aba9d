//! TTL- and capacity-bounded result cache with in-flight coalescing.
//!
//! Per fingerprint the cache is a three-state machine:
//!
//! ```text
//! Absent -> InFlight -> Cached -> Absent (expiry / eviction)
//! ```
//!
//! The `InFlight` and `Cached` sets are disjoint maps guarded by one mutex,
//! so a fingerprint is in exactly one of {absent, in-flight, cached} at any
//! instant and the `InFlight -> Cached` transition is atomic with respect to
//! new callers.
//!
//! Coalescing: the first caller for an absent fingerprint spawns the
//! computation as its own task and everyone — that caller included — waits on
//! a `watch` channel. Spawning means caller cancellation never aborts the
//! job: a successful result still lands in the cache for future callers,
//! which avoids both wasted engine work and a cache stampede on retry.
//!
//! Expiry is fixed-TTL from creation (a hit does not extend life); capacity
//! is enforced by evicting the least-recently-used cached entry. In-flight
//! jobs hold no cached payload and are never evicted. Failed jobs release
//! every waiter with the same error and transition back to `Absent` — errors
//! are never cached.

use crate::error::{PipelineError, Result};
use crate::fingerprint::Fingerprint;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Sweep cadence: one full expired-entry sweep per this many insertions.
const SWEEP_EVERY: u64 = 32;

type FlightResult<T> = Result<Arc<T>>;
type FlightReceiver<T> = watch::Receiver<Option<FlightResult<T>>>;

struct CacheEntry<T> {
    result: Arc<T>,
    expires_at: Instant,
    last_access: Instant,
}

struct CacheState<T> {
    entries: HashMap<Fingerprint, CacheEntry<T>>,
    in_flight: HashMap<Fingerprint, FlightReceiver<T>>,
}

impl<T> Default for CacheState<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub in_flight: usize,
    pub hits: u64,
    pub misses: u64,
    pub coalesced: u64,
    pub evicted: u64,
    pub expired: u64,
}

/// In-memory result cache keyed by [`Fingerprint`].
///
/// Deliberately process-local: nothing survives a restart and no cross-
/// instance coherence exists.
pub struct ResultCache<T> {
    ttl: Duration,
    max_items: usize,
    state: Mutex<CacheState<T>>,
    inserts: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evicted: AtomicU64,
    expired: AtomicU64,
}

enum Role<T> {
    Hit(Arc<T>),
    Waiter(FlightReceiver<T>),
    Leader {
        tx: watch::Sender<Option<FlightResult<T>>>,
        rx: FlightReceiver<T>,
    },
}

impl<T: Send + Sync + 'static> ResultCache<T> {
    pub fn new(ttl: Duration, max_items: usize) -> Self {
        Self {
            ttl,
            max_items: max_items.max(1),
            state: Mutex::new(CacheState::default()),
            inserts: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Return the cached result for `fingerprint`, or ensure exactly one
    /// execution of `compute` no matter how many callers arrive concurrently.
    ///
    /// The boolean is true only when the result came from a stored entry.
    pub async fn get_or_compute<F, Fut>(
        self: &Arc<Self>,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<(Arc<T>, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        match self.claim(fingerprint) {
            Role::Hit(result) => {
                tracing::debug!(fingerprint = %fingerprint.short(), "cache hit");
                Ok((result, true))
            }
            Role::Waiter(rx) => {
                tracing::debug!(fingerprint = %fingerprint.short(), "coalescing onto in-flight job");
                self.await_flight(rx).await.map(|r| (r, false))
            }
            Role::Leader { tx, rx } => {
                let cache = Arc::clone(self);
                let future = compute();
                tokio::spawn(async move {
                    // The guard transitions InFlight -> Absent if this task
                    // unwinds before publishing, so a panicking job can never
                    // wedge its fingerprint.
                    let guard = FlightGuard {
                        cache,
                        fingerprint,
                        armed: true,
                    };
                    let result: FlightResult<T> = future.await.map(Arc::new);
                    guard.publish(&result);
                    // All waiters may already have gone away; that is fine.
                    let _ = tx.send(Some(result));
                });
                self.await_flight(rx).await.map(|r| (r, false))
            }
        }
    }

    /// Classify this caller under the state lock.
    fn claim(self: &Arc<Self>, fingerprint: Fingerprint) -> Role<T> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let mut stale = false;
        if let Some(entry) = state.entries.get_mut(&fingerprint) {
            if entry.expires_at > now {
                entry.last_access = now;
                let result = Arc::clone(&entry.result);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Role::Hit(result);
            }
            stale = true;
        }
        if stale {
            state.entries.remove(&fingerprint);
            self.expired.fetch_add(1, Ordering::Relaxed);
        }

        if let Some(rx) = state.in_flight.get(&fingerprint) {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
            return Role::Waiter(rx.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = watch::channel(None);
        state.in_flight.insert(fingerprint, rx.clone());
        Role::Leader { tx, rx }
    }

    async fn await_flight(&self, mut rx: FlightReceiver<T>) -> Result<Arc<T>> {
        loop {
            if let Some(result) = rx.borrow_and_update().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                // Publisher dropped without sending: the job task unwound.
                return Err(PipelineError::Internal(
                    "in-flight job aborted before producing a result".to_string(),
                ));
            }
        }
    }

    /// `InFlight -> Cached` (success) or `InFlight -> Absent` (failure),
    /// atomically with respect to new callers.
    fn settle(&self, fingerprint: Fingerprint, result: &FlightResult<T>) {
        let mut state = self.state.lock();
        state.in_flight.remove(&fingerprint);

        if let Ok(value) = result {
            let now = Instant::now();
            while state.entries.len() >= self.max_items {
                let victim = state
                    .entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_access)
                    .map(|(fp, _)| *fp);
                match victim {
                    Some(fp) => {
                        state.entries.remove(&fp);
                        self.evicted.fetch_add(1, Ordering::Relaxed);
                        tracing::debug!(fingerprint = %fp.short(), "evicted lru cache entry");
                    }
                    None => break,
                }
            }
            state.entries.insert(
                fingerprint,
                CacheEntry {
                    result: Arc::clone(value),
                    expires_at: now + self.ttl,
                    last_access: now,
                },
            );
            drop(state);

            if self.inserts.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
                self.sweep();
            }
        }
    }

    fn abort(&self, fingerprint: Fingerprint) {
        let mut state = self.state.lock();
        state.in_flight.remove(&fingerprint);
        tracing::warn!(fingerprint = %fingerprint.short(), "in-flight job aborted, fingerprint released");
    }

    /// Remove every expired entry; returns how many were dropped. Runs
    /// opportunistically on insertion and may be scheduled by the host.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - state.entries.len();
        if removed > 0 {
            self.expired.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(removed, "swept expired cache entries");
        }
        removed
    }

    /// Number of cached (not in-flight) entries.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of fingerprints currently in flight.
    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// True when `fingerprint` has a live cached entry.
    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        let state = self.state.lock();
        state
            .entries
            .get(fingerprint)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }

    /// Drop every cached entry; in-flight jobs are left to finish.
    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            in_flight: state.in_flight.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
        }
    }
}

/// Releases the in-flight claim if the job task dies before publishing.
struct FlightGuard<T: Send + Sync + 'static> {
    cache: Arc<ResultCache<T>>,
    fingerprint: Fingerprint,
    armed: bool,
}

impl<T: Send + Sync + 'static> FlightGuard<T> {
    fn publish(mut self, result: &FlightResult<T>) {
        self.armed = false;
        self.cache.settle(self.fingerprint, result);
    }
}

impl<T: Send + Sync + 'static> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.abort(self.fingerprint);
        }
    }
}
