// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory plan store.
//!
//! [`MemoryTier`] keeps entries in a hash map and enforces its budgets on
//! every `put`: expired entries are swept first, then least-recently-used
//! entries are evicted until both the entry budget and the byte budget hold
//! again. Entries older than the configured TTL read as absent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::{PlanStore, StoreError};

/// Budgets for a [`MemoryTier`]. `None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryTierConfig {
    /// Maximum number of entries.
    pub max_entries: Option<usize>,
    /// Maximum total key + value bytes.
    pub max_bytes: Option<usize>,
    /// Maximum entry age.
    pub ttl: Option<Duration>,
}

/// Point-in-time counters for a [`MemoryTier`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryTierStats {
    /// Entries currently held. Entries that expired since the last `put` are
    /// still counted.
    pub entries: usize,
    /// Total key + value bytes currently held.
    pub bytes: usize,
    /// Entries evicted to satisfy a budget.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

struct Entry {
    value: Arc<[u8]>,
    inserted_at: Instant,
    tick: u64,
}

#[derive(Default)]
struct Inner {
    entries: FxHashMap<Arc<[u8]>, Entry>,
    /// Access tick -> key; the first entry is the least recently used.
    recency: BTreeMap<u64, Arc<[u8]>>,
    next_tick: u64,
    bytes: usize,
    evictions: u64,
    expirations: u64,
    closed: bool,
}

impl Inner {
    fn touch(&mut self, key: &Arc<[u8]>) {
        let tick = self.next_tick;
        self.next_tick += 1;
        if let Some(entry) = self.entries.get_mut(key) {
            self.recency.remove(&entry.tick);
            entry.tick = tick;
            self.recency.insert(tick, Arc::clone(key));
        }
    }

    fn drop_entry(&mut self, key: &[u8]) -> bool {
        match self.entries.remove_entry(key) {
            Some((k, entry)) => {
                self.recency.remove(&entry.tick);
                self.bytes -= k.len() + entry.value.len();
                true
            }
            None => false,
        }
    }

    /// Drop every entry inserted at or before `cutoff`; returns how many.
    fn purge_inserted_before(&mut self, cutoff: Instant) -> usize {
        let expired: Vec<Arc<[u8]>> = self
            .entries
            .iter()
            .filter(|(_, e)| e.inserted_at <= cutoff)
            .map(|(k, _)| Arc::clone(k))
            .collect();
        for key in &expired {
            self.drop_entry(key);
        }
        self.expirations += expired.len() as u64;
        expired.len()
    }

    fn evict_lru(&mut self) -> bool {
        let Some((_, key)) = self.recency.pop_first() else {
            return false;
        };
        if let Some(entry) = self.entries.remove(&key) {
            self.bytes -= key.len() + entry.value.len();
            self.evictions += 1;
        }
        true
    }
}

/// In-process LRU store with optional entry, byte and age budgets.
///
/// Cloning is not supported; share a tier behind an `Arc` (which itself
/// implements [`PlanStore`]).
pub struct MemoryTier {
    inner: Mutex<Inner>,
    config: MemoryTierConfig,
}

impl MemoryTier {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::with_config(MemoryTierConfig::default())
    }

    /// Create a store with the given budgets.
    pub fn with_config(config: MemoryTierConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            config,
        }
    }

    /// Configured budgets.
    pub fn config(&self) -> MemoryTierConfig {
        self.config
    }

    /// Current counters.
    pub fn stats(&self) -> MemoryTierStats {
        let inner = self.inner.lock();
        MemoryTierStats {
            entries: inner.entries.len(),
            bytes: inner.bytes,
            evictions: inner.evictions,
            expirations: inner.expirations,
        }
    }

    fn is_expired(&self, entry: &Entry, now: Instant) -> bool {
        self.config
            .ttl
            .is_some_and(|ttl| now.duration_since(entry.inserted_at) >= ttl)
    }

    fn over_budget(&self, inner: &Inner) -> bool {
        self.config
            .max_entries
            .is_some_and(|max| inner.entries.len() > max)
            || self.config.max_bytes.is_some_and(|max| inner.bytes > max)
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new()
    }
}

impl PlanStore for MemoryTier {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.drop_entry(key);
        let now = Instant::now();
        if let Some(cutoff) = self.config.ttl.and_then(|ttl| now.checked_sub(ttl)) {
            let expired = inner.purge_inserted_before(cutoff);
            if expired > 0 {
                debug!(expired, "memory tier dropped expired entries");
            }
        }

        let key: Arc<[u8]> = Arc::from(key);
        let tick = inner.next_tick;
        inner.next_tick += 1;
        inner.bytes += key.len() + value.len();
        inner.recency.insert(tick, Arc::clone(&key));
        inner.entries.insert(
            key,
            Entry {
                value: Arc::from(value),
                inserted_at: now,
                tick,
            },
        );

        let before = inner.evictions;
        // An entry larger than the whole byte budget evicts itself too.
        while self.over_budget(&inner) && inner.evict_lru() {}
        if inner.evictions > before {
            debug!(
                evicted = inner.evictions - before,
                entries = inner.entries.len(),
                bytes = inner.bytes,
                "memory tier evicted entries"
            );
        }
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let now = Instant::now();
        let (shared_key, value, expired) = match inner.entries.get_key_value(key) {
            Some((k, entry)) => (
                Arc::clone(k),
                Arc::clone(&entry.value),
                self.is_expired(entry, now),
            ),
            None => return Ok(None),
        };
        if expired {
            inner.drop_entry(key);
            inner.expirations += 1;
            return Ok(None);
        }
        inner.touch(&shared_key);
        Ok(Some(value))
    }

    fn remove(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.drop_entry(key))
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.entries.clear();
        inner.recency.clear();
        inner.bytes = 0;
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.recency.clear();
        inner.bytes = 0;
        inner.closed = true;
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self.inner.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        let now = Instant::now();
        Ok(inner
            .entries
            .values()
            .filter(|e| !self.is_expired(e, now))
            .count())
    }
}
