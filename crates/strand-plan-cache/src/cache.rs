// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The execution-plan cache.
//!
//! Lookups take one of two paths:
//!
//! 1. **Identity.** The exact graph object passed to
//!    [`cache_plan`](ExecutionPlanCache::cache_plan) is looked up by its
//!    identity token. The cached `Arc<P>` is returned as-is; no keys are
//!    computed and nothing is rebound.
//! 2. **Structural.** A [`GraphKey`] is computed for the caller's graph and
//!    looked up in the [`PlanStore`]. A stored plan is decoded and rebound onto
//!    the caller's nodes.
//!
//! The identity map holds only `Weak` references to graph identity tokens, so
//! caching a graph never keeps it alive. Entries whose graph has been dropped
//! are purged on every call, releasing the plan (and the nodes it references)
//! with them. Note that the identity path trusts the
//! caller: mutating a graph after caching it does not invalidate its identity
//! entry.
//!
//! Store failures, undecodable entries and failed rebinds are logged and
//! reported as misses. Only caller bugs (use after shutdown, an unfunctioned
//! node, a plan referencing foreign nodes) are returned as errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strand_depgraph::{DependencyGraph, GraphIdentity};
use strand_store::PlanStore;
use strand_value::TargetSpecification;
use tracing::{debug, warn};

use crate::config::{open_store, ConfigError, PlanCacheConfig};
use crate::keys::{self, GraphKey, KeyError, NodeKey};
use crate::plan::{DetachedPlan, ExecutionPlan, NodeBindings, NodeTable, PlanError};
use crate::stats::{CacheStatistics, CacheStatisticsSnapshot};

/// Layout version of stored plan entries.
pub const STORED_PLAN_FORMAT: u16 = 1;

/// Caller errors. Environment failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The cache was shut down.
    #[error("[CACHE_SHUTDOWN] plan cache has been shut down")]
    Shutdown,
    /// The graph contains a node without a function.
    #[error("[CACHE_UNFUNCTIONED] node #{index} for {target} has no function assigned")]
    UnfunctionedNode {
        /// Insertion index of the node.
        index: usize,
        /// Target of the node.
        target: TargetSpecification,
    },
    /// The plan could not be detached from the graph being cached.
    #[error("[CACHE_PLAN] {0}")]
    Plan(#[from] PlanError),
}

/// Lifecycle state of an [`ExecutionPlanCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Accepting calls.
    Active,
    /// Terminal; every call except `shutdown` fails.
    Shutdown,
}

/// Entry value as written to the store.
#[derive(Serialize, Deserialize)]
struct StoredPlan<D> {
    format: u16,
    node_keys: Vec<NodeKey>,
    plan: D,
}

struct IdentityEntry<P> {
    graph: Weak<GraphIdentity>,
    epoch: u64,
    plan: Arc<P>,
}

/// Caches compiled plans by graph identity and by graph structure.
///
/// `P` is the plan type produced by the planner; `S` the backing store.
pub struct ExecutionPlanCache<P, S = Box<dyn PlanStore>> {
    store: S,
    identity: RwLock<FxHashMap<u64, IdentityEntry<P>>>,
    identity_fast_path: bool,
    shut_down: AtomicBool,
    stats: CacheStatistics,
}

impl<P: ExecutionPlan> ExecutionPlanCache<P> {
    /// Build a cache over the store described by `config`.
    pub fn from_config(config: &PlanCacheConfig) -> Result<Self, ConfigError> {
        let store = open_store(&config.store)?;
        Ok(Self::new(store).with_identity_fast_path(config.identity_fast_path))
    }
}

impl<P: ExecutionPlan, S: PlanStore> ExecutionPlanCache<P, S> {
    /// Create an active cache over `store`.
    pub fn new(store: S) -> Self {
        Self {
            store,
            identity: RwLock::new(FxHashMap::default()),
            identity_fast_path: true,
            shut_down: AtomicBool::new(false),
            stats: CacheStatistics::default(),
        }
    }

    /// Enable or disable the identity fast path.
    pub fn with_identity_fast_path(mut self, enabled: bool) -> Self {
        self.identity_fast_path = enabled;
        self
    }

    /// Remember `plan` as the compiled form of `graph` at `epoch`.
    ///
    /// Writing an equal key again overwrites the stored entry.
    ///
    /// # Errors
    /// [`CacheError::Shutdown`] after [`shutdown`](Self::shutdown);
    /// [`CacheError::UnfunctionedNode`] if the graph is not fully compiled;
    /// [`CacheError::Plan`] if `plan` references nodes outside `graph`.
    pub fn cache_plan(
        &self,
        graph: &DependencyGraph,
        epoch: u64,
        plan: Arc<P>,
    ) -> Result<(), CacheError> {
        self.ensure_active()?;
        let table = self.node_table(graph)?;
        let key = GraphKey::from_parts(
            epoch,
            table.keys().iter().cloned(),
            graph.terminal_outputs().clone(),
        );
        let detached = plan.detach(&table)?;
        let stored = StoredPlan {
            format: STORED_PLAN_FORMAT,
            node_keys: table.keys().to_vec(),
            plan: detached,
        };

        let encoded = key
            .store_key()
            .and_then(|k| keys::encode(&stored).map(|v| (k, v)));
        match encoded {
            Ok((key_bytes, value)) => match self.store.put(&key_bytes, &value) {
                Ok(()) => {
                    self.stats.stored();
                    debug!(
                        graph = graph.name(),
                        epoch,
                        nodes = graph.len(),
                        bytes = value.len(),
                        "cached execution plan"
                    );
                }
                Err(err) => {
                    self.stats.store_error();
                    warn!(graph = graph.name(), epoch, ?err, "plan store write failed");
                }
            },
            Err(err) => {
                self.stats.store_error();
                warn!(graph = graph.name(), epoch, ?err, "could not encode plan entry");
            }
        }

        if self.identity_fast_path {
            let mut identity = self.identity.write();
            identity.retain(|_, e| e.graph.strong_count() > 0);
            identity.insert(
                graph.identity().id(),
                IdentityEntry {
                    graph: Arc::downgrade(graph.identity()),
                    epoch,
                    plan,
                },
            );
        }
        Ok(())
    }

    /// Find a plan for `graph` compiled at `epoch`.
    ///
    /// Returns `Ok(None)` on a miss, including when the store fails or holds
    /// an entry that cannot be used.
    ///
    /// # Errors
    /// [`CacheError::Shutdown`] after [`shutdown`](Self::shutdown);
    /// [`CacheError::UnfunctionedNode`] if the graph is not fully compiled.
    pub fn get_cached_plan(
        &self,
        graph: &DependencyGraph,
        epoch: u64,
    ) -> Result<Option<Arc<P>>, CacheError> {
        self.ensure_active()?;
        self.purge_dropped_graphs();
        if let Some(plan) = self.identity_lookup(graph, epoch) {
            self.stats.identity_hit();
            debug!(graph = graph.name(), epoch, "plan cache identity hit");
            return Ok(Some(plan));
        }

        let table = self.node_table(graph)?;
        let key = GraphKey::from_parts(
            epoch,
            table.keys().iter().cloned(),
            graph.terminal_outputs().clone(),
        );
        let key_bytes = match key.store_key() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(graph = graph.name(), epoch, ?err, "could not encode graph key");
                return Ok(self.miss());
            }
        };

        let bytes = match self.store.get(&key_bytes) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(graph = graph.name(), epoch, nodes = graph.len(), "plan cache miss");
                return Ok(self.miss());
            }
            Err(err) => {
                self.stats.store_error();
                warn!(graph = graph.name(), epoch, ?err, "plan store read failed");
                return Ok(self.miss());
            }
        };

        let stored = match decode_entry::<P::Detached>(&bytes) {
            Ok(stored) => stored,
            Err(err) => {
                self.stats.decode_error();
                warn!(graph = graph.name(), epoch, ?err, "evicting undecodable plan entry");
                if let Err(err) = self.store.remove(&key_bytes) {
                    warn!(?err, "could not evict undecodable plan entry");
                }
                return Ok(self.miss());
            }
        };

        let Some(bindings) = NodeBindings::bind(stored.node_keys, &table, graph) else {
            self.stats.rebind_failure();
            warn!(
                graph = graph.name(),
                epoch, "stored node keys do not match graph; treating as miss"
            );
            return Ok(self.miss());
        };
        match stored.plan.rebind(&bindings) {
            Ok(plan) => {
                self.stats.structural_hit();
                debug!(graph = graph.name(), epoch, nodes = graph.len(), "plan cache structural hit");
                Ok(Some(Arc::new(plan)))
            }
            Err(err) => {
                self.stats.rebind_failure();
                warn!(graph = graph.name(), epoch, ?err, "stored plan failed to rebind");
                Ok(self.miss())
            }
        }
    }

    /// Drop every cached plan, in memory and in the store.
    ///
    /// # Errors
    /// [`CacheError::Shutdown`] after [`shutdown`](Self::shutdown).
    pub fn clear(&self) -> Result<(), CacheError> {
        self.ensure_active()?;
        self.identity.write().clear();
        if let Err(err) = self.store.clear() {
            self.stats.store_error();
            warn!(?err, "plan store clear failed");
        }
        Ok(())
    }

    /// Release the identity map and close the store. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.identity.write().clear();
        if let Err(err) = self.store.close() {
            warn!(?err, "plan store close failed");
        }
        debug!("plan cache shut down");
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CacheState {
        if self.shut_down.load(Ordering::Acquire) {
            CacheState::Shutdown
        } else {
            CacheState::Active
        }
    }

    /// Counter snapshot.
    pub fn statistics(&self) -> CacheStatisticsSnapshot {
        self.stats.snapshot()
    }

    /// Entries held by the identity map, including any whose graph was
    /// dropped since the last call.
    pub fn tracked_graphs(&self) -> usize {
        self.identity.read().len()
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn ensure_active(&self) -> Result<(), CacheError> {
        match self.state() {
            CacheState::Active => Ok(()),
            CacheState::Shutdown => Err(CacheError::Shutdown),
        }
    }

    /// Drop identity entries whose graph is gone, so their plans are released.
    fn purge_dropped_graphs(&self) {
        if !self.identity_fast_path {
            return;
        }
        let any_dead = self
            .identity
            .read()
            .values()
            .any(|e| e.graph.strong_count() == 0);
        if any_dead {
            self.identity
                .write()
                .retain(|_, e| e.graph.strong_count() > 0);
        }
    }

    fn identity_lookup(&self, graph: &DependencyGraph, epoch: u64) -> Option<Arc<P>> {
        if !self.identity_fast_path {
            return None;
        }
        let identity = self.identity.read();
        let entry = identity.get(&graph.identity().id())?;
        let same_graph = entry
            .graph
            .upgrade()
            .is_some_and(|g| Arc::ptr_eq(&g, graph.identity()));
        (same_graph && entry.epoch == epoch).then(|| Arc::clone(&entry.plan))
    }

    fn node_table(&self, graph: &DependencyGraph) -> Result<NodeTable, CacheError> {
        if let Some((index, node)) = graph.first_unfunctioned_node() {
            return Err(CacheError::UnfunctionedNode {
                index,
                target: node.target().clone(),
            });
        }
        self.stats.key_computation();
        NodeTable::new(graph).map_err(|err| CacheError::Plan(PlanError::Key(err)))
    }

    fn miss(&self) -> Option<Arc<P>> {
        self.stats.miss();
        None
    }
}

/// Plan-independent view of a stored entry value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntrySummary {
    /// Entry layout version.
    pub format: u16,
    /// Node keys in the cached graph's iteration order.
    pub node_keys: Vec<NodeKey>,
}

/// Decode the plan-independent part of a stored entry value.
///
/// Tools that list a store do not know the plan type; the plan body is
/// skipped.
pub fn summarize_entry(bytes: &[u8]) -> Result<StoredEntrySummary, KeyError> {
    let stored: StoredPlan<ciborium::Value> = keys::decode(bytes)?;
    Ok(StoredEntrySummary {
        format: stored.format,
        node_keys: stored.node_keys,
    })
}

fn decode_entry<D: DetachedPlan>(bytes: &[u8]) -> Result<StoredPlan<D>, KeyError> {
    let stored: StoredPlan<D> = keys::decode(bytes)?;
    if stored.format == STORED_PLAN_FORMAT {
        Ok(stored)
    } else {
        Err(KeyError::Decode(format!(
            "unsupported stored plan format {}",
            stored.format
        )))
    }
}
