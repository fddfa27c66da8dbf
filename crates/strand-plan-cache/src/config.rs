// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Cache configuration and store construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strand_store::{MemoryTier, MemoryTierConfig, PlanStore, StoreError};
use strand_store_fs::FsPlanStore;
use thiserror::Error;

/// Error type for configuration loading and store construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error while reading a config file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The configured store could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Which store backs the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// In-process LRU store.
    Memory {
        /// Entry budget.
        #[serde(default)]
        max_entries: Option<usize>,
        /// Byte budget (keys + values).
        #[serde(default)]
        max_bytes: Option<usize>,
        /// Entry lifetime in seconds.
        #[serde(default)]
        ttl_secs: Option<u64>,
    },
    /// One file per entry under `root`; `None` resolves through
    /// `STRAND_PLAN_CACHE_DIR`, then the platform cache dir.
    Fs {
        /// Store root.
        #[serde(default)]
        root: Option<PathBuf>,
    },
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory {
            max_entries: None,
            max_bytes: None,
            ttl_secs: None,
        }
    }
}

/// Top-level cache configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanCacheConfig {
    /// Backing store.
    pub store: StoreConfig,
    /// Answer lookups for the very graph object that was cached without
    /// computing keys.
    pub identity_fast_path: bool,
}

impl Default for PlanCacheConfig {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            identity_fast_path: true,
        }
    }
}

impl PlanCacheConfig {
    /// Parse a JSON document.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ConfigError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read(path) {
            Ok(bytes) if bytes.is_empty() => Ok(Self::default()),
            Ok(bytes) => Self::from_json_slice(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Build the store described by `config`.
pub fn open_store(config: &StoreConfig) -> Result<Box<dyn PlanStore>, ConfigError> {
    match config {
        StoreConfig::Memory {
            max_entries,
            max_bytes,
            ttl_secs,
        } => Ok(Box::new(MemoryTier::with_config(MemoryTierConfig {
            max_entries: *max_entries,
            max_bytes: *max_bytes,
            ttl: ttl_secs.map(Duration::from_secs),
        }))),
        StoreConfig::Fs { root: Some(root) } => Ok(Box::new(FsPlanStore::open(root)?)),
        StoreConfig::Fs { root: None } => Ok(Box::new(FsPlanStore::open_default()?)),
    }
}
