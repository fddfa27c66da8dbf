// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory `PlanStore` fake with failure injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use strand_store::{PlanStore, StoreError};

/// Recording implementation of [`PlanStore`] for testing.
///
/// Clones share state, so a test can hand one clone to a cache and inspect or
/// sabotage the entries through another.
///
/// # Example
///
/// ```
/// use strand_dry_tests::RecordingStore;
/// use strand_store::PlanStore;
///
/// let store = RecordingStore::new();
/// store.put(b"k", b"v").unwrap();
/// store.set_fail_on_get(true);
/// assert!(store.get(b"k").is_err());
/// assert_eq!(store.get_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct RecordingStore {
    inner: Arc<Mutex<RecordingStoreInner>>,
}

#[derive(Default)]
struct RecordingStoreInner {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    get_count: usize,
    put_count: usize,
    remove_count: usize,
    fail_on_get: bool,
    fail_on_put: bool,
    closed: bool,
}

impl RecordingStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `get` with a simulated timeout.
    pub fn set_fail_on_get(&self, fail: bool) {
        self.lock().fail_on_get = fail;
    }

    /// Fail every `put` with a simulated I/O error.
    pub fn set_fail_on_put(&self, fail: bool) {
        self.lock().fail_on_put = fail;
    }

    /// Number of `get` calls (attempted, not successful).
    pub fn get_count(&self) -> usize {
        self.lock().get_count
    }

    /// Number of `put` calls (attempted, not successful).
    pub fn put_count(&self) -> usize {
        self.lock().put_count
    }

    /// Number of `remove` calls.
    pub fn remove_count(&self) -> usize {
        self.lock().remove_count
    }

    /// Stored keys in byte order.
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.lock().data.keys().cloned().collect()
    }

    /// Replace the value of every stored entry with `value`.
    pub fn overwrite_values(&self, value: &[u8]) {
        for v in self.lock().data.values_mut() {
            *v = value.to_vec();
        }
    }

    /// Returns `true` once `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RecordingStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PlanStore for RecordingStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.put_count += 1;
        if inner.closed {
            return Err(StoreError::Closed);
        }
        if inner.fail_on_put {
            return Err(StoreError::Io(std::io::Error::other("simulated put failure")));
        }
        inner.data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError> {
        let mut inner = self.lock();
        inner.get_count += 1;
        if inner.closed {
            return Err(StoreError::Closed);
        }
        if inner.fail_on_get {
            return Err(StoreError::Timeout {
                after: std::time::Duration::from_millis(50),
            });
        }
        Ok(inner.data.get(key).map(|v| Arc::from(v.as_slice())))
    }

    fn remove(&self, key: &[u8]) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        inner.remove_count += 1;
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.data.remove(key).is_some())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        inner.data.clear();
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        self.lock().closed = true;
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let inner = self.lock();
        if inner.closed {
            return Err(StoreError::Closed);
        }
        Ok(inner.data.len())
    }
}
