// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Byte-level key/value store port used by the plan cache.
//!
//! `strand-store` provides the [`PlanStore`] trait: a deliberately narrow
//! capability (`put`/`get`/`remove` by bytes, `clear`, `close`) so that any
//! conforming key/value cache can back the plan cache without the cache knowing
//! how entries are kept. [`MemoryTier`] is the in-process implementation; the
//! disk tier lives in `strand-store-fs`.
//!
//! # Ownership Policy
//!
//! A store is a cache, not a source of truth. Implementations may drop any
//! entry at any time (eviction, TTL, another cluster member clearing it), and
//! callers must treat absence as a normal outcome. Concurrent writers are
//! expected; for a given key any observed value is one that some writer put.
//!
//! # Determinism Invariant
//!
//! No public API exposes store iteration order. Any listing API an
//! implementation adds must return entries sorted by [`KeyDigest`].
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod memory;
pub use memory::{MemoryTier, MemoryTierConfig, MemoryTierStats};

use std::sync::Arc;
use std::time::Duration;

/// A 32-byte BLAKE3 digest of a store key.
///
/// Stores that cannot use arbitrary byte strings as native keys (file names,
/// fixed-width slots) address entries by this digest and keep the full key
/// alongside the value to rule out collisions.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct KeyDigest(pub [u8; 32]);

impl KeyDigest {
    /// View the digest as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for KeyDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the BLAKE3 digest of a store key.
pub fn key_digest(key: &[u8]) -> KeyDigest {
    KeyDigest(*blake3::hash(key).as_bytes())
}

/// Errors a store may report.
///
/// Every variant is an *environment* failure from the plan cache's point of
/// view: the cache degrades to a miss and carries on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store was closed; no further calls are accepted.
    #[error("[STORE_CLOSED] store is closed")]
    Closed,
    /// The operation did not complete within the store's latency budget.
    #[error("[STORE_TIMEOUT] operation exceeded {after:?}")]
    Timeout {
        /// Budget that was exceeded.
        after: Duration,
    },
    /// Underlying I/O failure.
    #[error("[STORE_IO] {0}")]
    Io(#[from] std::io::Error),
    /// A stored entry could not be read back.
    #[error("[STORE_CORRUPT] {0}")]
    Corrupt(String),
    /// Any other backend failure.
    #[error("[STORE_OTHER] {0}")]
    Other(String),
}

/// Narrow byte-level key/value capability backing the plan cache.
///
/// Methods take `&self`; implementations synchronise internally so one store
/// can be shared across threads (and, for distributed backends, processes).
///
/// # Absence Semantics
///
/// [`get`](PlanStore::get) returns `Ok(None)` for missing entries; this is
/// **not** an error. Errors are reserved for backend failures.
///
/// # Latency
///
/// Every call must return within a bounded time. Backends with remote or
/// blocking I/O report an overrun as [`StoreError::Timeout`] rather than
/// waiting indefinitely.
pub trait PlanStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve the value under `key`. Absence is `Ok(None)`.
    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError>;

    /// Remove the entry under `key`. Returns whether an entry was removed.
    fn remove(&self, key: &[u8]) -> Result<bool, StoreError>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), StoreError>;

    /// Release backend resources. Idempotent; later calls to any other
    /// method return [`StoreError::Closed`].
    fn close(&self) -> Result<(), StoreError>;

    /// Number of live entries.
    fn len(&self) -> Result<usize, StoreError>;

    /// Returns `true` if the store holds no live entries.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

impl<S: PlanStore + ?Sized> PlanStore for Arc<S> {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError> {
        (**self).get(key)
    }

    fn remove(&self, key: &[u8]) -> Result<bool, StoreError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }

    fn close(&self) -> Result<(), StoreError> {
        (**self).close()
    }

    fn len(&self) -> Result<usize, StoreError> {
        (**self).len()
    }
}

impl<S: PlanStore + ?Sized> PlanStore for Box<S> {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn get(&self, key: &[u8]) -> Result<Option<Arc<[u8]>>, StoreError> {
        (**self).get(key)
    }

    fn remove(&self, key: &[u8]) -> Result<bool, StoreError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        (**self).clear()
    }

    fn close(&self) -> Result<(), StoreError> {
        (**self).close()
    }

    fn len(&self) -> Result<usize, StoreError> {
        (**self).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_display_is_lower_hex() {
        let d = KeyDigest([0xAB; 32]);
        assert_eq!(d.to_string(), "ab".repeat(32));
    }

    #[test]
    fn digest_matches_blake3() {
        assert_eq!(key_digest(b"k").0, *blake3::hash(b"k").as_bytes());
        assert_ne!(key_digest(b"k"), key_digest(b"j"));
    }

    #[test]
    fn shared_handles_forward() {
        let store: Arc<dyn PlanStore> = Arc::new(MemoryTier::new());
        store.put(b"k", b"v").ok();
        let boxed: Box<dyn PlanStore> = Box::new(Arc::clone(&store));
        assert_eq!(boxed.get(b"k").ok().flatten().as_deref(), Some(&b"v"[..]));
        assert_eq!(boxed.len().ok(), Some(1));
    }
}
