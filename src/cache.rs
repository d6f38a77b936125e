//! Bounded in-memory image cache with TTL expiry and LRU eviction.
//!
//! Entries are immutable byte blobs. A hit refreshes recency but never the
//! expiry deadline. All access goes through one mutex; callers must not hold
//! it across an outbound request, which the `get`/`set` API makes impossible.
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_MAX_ENTRIES: usize = 200;
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry {
    bytes: Bytes,
    inserted_at: Instant,
    last_used: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn evict_lru(&mut self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone());
        if let Some(key) = oldest {
            tracing::debug!(key = %key, "Evicting least-recently-used cache entry");
            self.entries.remove(&key);
        }
    }
}

pub struct ImageCache {
    inner: Mutex<Inner>,
    max_entries: usize,
    ttl: Duration,
}

impl ImageCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        ImageCache {
            inner: Mutex::new(Inner { entries: HashMap::new(), tick: 0 }),
            max_entries: max_entries.max(1),
            ttl,
        }
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.get_at(key, Instant::now())
    }

    pub fn set(&self, key: impl Into<String>, bytes: Bytes) {
        self.set_at(key.into(), bytes, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn get_at(&self, key: &str, now: Instant) -> Option<Bytes> {
        let mut inner = self.lock();
        let expired = match inner.entries.get(key) {
            None => return None,
            Some(entry) => now.saturating_duration_since(entry.inserted_at) >= self.ttl,
        };
        if expired {
            inner.entries.remove(key);
            return None;
        }
        let tick = inner.next_tick();
        let entry = inner.entries.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.bytes.clone())
    }

    pub(crate) fn set_at(&self, key: String, bytes: Bytes, now: Instant) {
        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            inner.evict_lru();
        }
        let tick = inner.next_tick();
        inner.entries.insert(key, Entry { bytes, inserted_at: now, last_used: tick });
    }

    // A poisoned lock only means another request panicked mid-update; the map
    // itself is still consistent.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        ImageCache::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}
