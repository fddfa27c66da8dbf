// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cache counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Live counters, updated lock-free by concurrent cache calls.
#[derive(Debug, Default)]
pub struct CacheStatistics {
    identity_hits: AtomicU64,
    structural_hits: AtomicU64,
    misses: AtomicU64,
    stores: AtomicU64,
    store_errors: AtomicU64,
    decode_errors: AtomicU64,
    rebind_failures: AtomicU64,
    key_computations: AtomicU64,
}

macro_rules! bump {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl CacheStatistics {
    bump! {
        identity_hit => identity_hits,
        structural_hit => structural_hits,
        miss => misses,
        stored => stores,
        store_error => store_errors,
        decode_error => decode_errors,
        rebind_failure => rebind_failures,
        key_computation => key_computations,
    }

    /// Copy the current counter values.
    pub fn snapshot(&self) -> CacheStatisticsSnapshot {
        CacheStatisticsSnapshot {
            identity_hits: self.identity_hits.load(Ordering::Relaxed),
            structural_hits: self.structural_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stores: self.stores.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            rebind_failures: self.rebind_failures.load(Ordering::Relaxed),
            key_computations: self.key_computations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStatistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatisticsSnapshot {
    /// Lookups answered by the identity fast path.
    pub identity_hits: u64,
    /// Lookups answered by a stored plan rebound onto the caller's graph.
    pub structural_hits: u64,
    /// Lookups that returned nothing.
    pub misses: u64,
    /// Successful `cache_plan` calls.
    pub stores: u64,
    /// Store calls that failed or timed out.
    pub store_errors: u64,
    /// Stored entries that could not be decoded.
    pub decode_errors: u64,
    /// Stored plans that could not be bound to the caller's graph.
    pub rebind_failures: u64,
    /// Graph-wide node key computations.
    pub key_computations: u64,
}

impl CacheStatisticsSnapshot {
    /// Total lookups.
    pub fn lookups(&self) -> u64 {
        self.identity_hits + self.structural_hits + self.misses
    }

    /// Fraction of lookups that hit, `0.0` before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        match self.lookups() {
            0 => 0.0,
            n => (self.identity_hits + self.structural_hits) as f64 / n as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = CacheStatistics::default();
        stats.identity_hit();
        stats.structural_hit();
        stats.miss();
        stats.miss();
        let snap = stats.snapshot();
        assert_eq!(snap.lookups(), 4);
        assert!((snap.hit_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_ratio_is_zero() {
        assert!(CacheStatisticsSnapshot::default().hit_ratio().abs() < f64::EPSILON);
    }
}
