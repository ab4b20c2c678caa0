//! Bounded, single-flight result cache keyed by query string.
//!
//! Concurrent callers asking for the same key share one computation: the
//! first caller runs it and the rest wait on the same [`OnceCell`]. Entries
//! are evicted least-recently-used once `capacity` is reached, and can
//! optionally expire a fixed time after their value became ready.
//!
//! An entry with callers still waiting on an unfinished computation is never
//! evicted or expired. If every entry is in flight the cache temporarily
//! holds more than `capacity` keys and shrinks back on later inserts.
//!
//! A failed computation leaves the cell empty, so the next caller retries.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::debug;

struct Slot<V> {
    cell: Arc<OnceCell<V>>,
    last_used: u64,
    /// When the value was first observed ready. `None` while computing.
    ready_at: Option<Instant>,
    /// Callers currently inside `get_or_*` for this cell.
    pending: usize,
}

impl<V> Slot<V> {
    fn evictable(&self) -> bool {
        self.pending == 0 || self.cell.initialized()
    }
}

struct Slots<V> {
    entries: HashMap<String, Slot<V>>,
    tick: u64,
}

/// Registration of one caller on a slot. Dropping it (on completion,
/// error, panic or cancellation) releases the slot and stamps readiness.
struct InFlight<'a, V> {
    cache: &'a RetrievalCache<V>,
    key: &'a str,
    cell: Arc<OnceCell<V>>,
}

impl<V> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        let mut slots = self.cache.inner.lock();
        if let Some(slot) = slots.entries.get_mut(self.key) {
            if Arc::ptr_eq(&slot.cell, &self.cell) {
                slot.pending = slot.pending.saturating_sub(1);
                if slot.ready_at.is_none() && self.cell.initialized() {
                    slot.ready_at = Some(Instant::now());
                }
            }
        }
    }
}

pub struct RetrievalCache<V> {
    inner: Mutex<Slots<V>>,
    capacity: usize,
    ttl: Option<Duration>,
}

impl<V: Clone> RetrievalCache<V> {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(Slots {
                entries: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            ttl,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of keys currently held, including in-flight computations.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Returns the cached value for `key`, or runs `compute` to produce it.
    /// Errors are returned to every waiting caller's own attempt and are
    /// never stored.
    pub async fn get_or_try_compute<E, F, Fut>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let entry = self.enter(key);
        let result = entry.cell.get_or_try_init(compute).await.cloned();
        drop(entry);
        result
    }

    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let entry = self.enter(key);
        let value = entry.cell.get_or_init(compute).await.clone();
        drop(entry);
        value
    }

    fn enter<'a>(&'a self, key: &'a str) -> InFlight<'a, V> {
        let mut slots = self.inner.lock();
        slots.tick += 1;
        let tick = slots.tick;
        let now = Instant::now();

        if let Some(slot) = slots.entries.get_mut(key) {
            let expired = match (self.ttl, slot.ready_at) {
                (Some(ttl), Some(ready_at)) => now.duration_since(ready_at) >= ttl,
                _ => false,
            };
            if !expired {
                slot.last_used = tick;
                slot.pending += 1;
                return InFlight {
                    cache: self,
                    key,
                    cell: slot.cell.clone(),
                };
            }
            debug!(key, "Cache entry expired");
            slots.entries.remove(key);
        }

        while slots.entries.len() >= self.capacity {
            let victim = slots
                .entries
                .iter()
                .filter(|(_, slot)| slot.evictable())
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(k, _)| k.clone());
            match victim {
                Some(victim) => {
                    debug!(evicted = %victim, "Cache full, evicting least recently used entry");
                    slots.entries.remove(&victim);
                }
                None => {
                    debug!(
                        len = slots.entries.len(),
                        capacity = self.capacity,
                        "Cache full of in-flight entries, admitting over capacity"
                    );
                    break;
                }
            }
        }

        let cell = Arc::new(OnceCell::new());
        slots.entries.insert(
            key.to_string(),
            Slot {
                cell: cell.clone(),
                last_used: tick,
                ready_at: None,
                pending: 1,
            },
        );
        InFlight {
            cache: self,
            key,
            cell,
        }
    }
}
