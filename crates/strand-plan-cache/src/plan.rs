// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The execution-plan abstraction.
//!
//! A compiled plan may hold [`NodeRef`] handles into the graph it was compiled
//! from. Handles cannot be serialized and are meaningless for any other graph,
//! so a plan is cached in *detached* form: every handle replaced by its
//! position in the graph's node-key list ([`NodeTable`]). On a structural hit
//! the detached plan is *rebound* against the caller's graph through
//! [`NodeBindings`], which maps each stored position to the caller's node with
//! the same [`NodeKey`].

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use strand_depgraph::{DependencyGraph, GraphError, NodeRef};
use strand_value::TargetSpecification;

use crate::keys::{KeyError, NodeKey};

/// Errors raised by plans while detaching, rebinding or running.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// The plan references a node that is not part of the graph being cached.
    #[error("[PLAN_FOREIGN_NODE] plan references a node for {target} outside the graph")]
    ForeignNode {
        /// Target of the foreign node.
        target: TargetSpecification,
    },
    /// A detached plan references a position past the end of the node list.
    #[error("[PLAN_BAD_INDEX] node index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// Referenced position.
        index: usize,
        /// Number of bound nodes.
        len: usize,
    },
    /// The graph could not be ordered.
    #[error("[PLAN_GRAPH] {0}")]
    Graph(#[from] GraphError),
    /// The graph could not be keyed.
    #[error("[PLAN_KEY] {0}")]
    Key(#[from] KeyError),
    /// A node failed while the plan was running.
    #[error("[PLAN_NODE_FAILED] node for {target} failed: {message}")]
    NodeFailed {
        /// Target of the failed node.
        target: TargetSpecification,
        /// Runner-supplied reason.
        message: String,
    },
}

/// A runnable plan compiled from a [`DependencyGraph`].
pub trait ExecutionPlan: Send + Sync + 'static {
    /// Serializable, graph-independent form of this plan.
    type Detached: DetachedPlan<Plan = Self>;

    /// Replace every node handle with its position in `table`.
    ///
    /// # Errors
    /// [`PlanError::ForeignNode`] if the plan references a node `table` does
    /// not index.
    fn detach(&self, table: &NodeTable) -> Result<Self::Detached, PlanError>;

    /// Execute the plan, reporting per-node statistics to `stats`.
    fn run(
        &self,
        runner: &dyn NodeRunner,
        stats: &dyn StatisticsGatherer,
    ) -> Result<RunReport, PlanError>;
}

/// A plan with node handles replaced by node-list positions.
///
/// `rebind` must be a pure function of `self` and `bindings`: concurrent
/// callers rebinding copies of one stored plan never coordinate.
pub trait DetachedPlan: Serialize + DeserializeOwned + Send + Sized + 'static {
    /// Plan type produced by [`rebind`](Self::rebind).
    type Plan: ExecutionPlan<Detached = Self>;

    /// Produce a live plan whose node references point at `bindings`' nodes.
    fn rebind(self, bindings: &NodeBindings) -> Result<Self::Plan, PlanError>;
}

/// Node keys of a graph in iteration order, indexed by node identity.
#[derive(Debug)]
pub struct NodeTable {
    keys: Vec<NodeKey>,
    positions: FxHashMap<NodeRef, usize>,
}

impl NodeTable {
    /// Key every node of `graph`.
    ///
    /// # Errors
    /// [`KeyError::Unfunctioned`] for the first node without a function.
    pub fn new(graph: &DependencyGraph) -> Result<Self, KeyError> {
        let mut keys = Vec::with_capacity(graph.len());
        let mut positions = FxHashMap::default();
        for (i, node) in graph.nodes().iter().enumerate() {
            keys.push(NodeKey::from_node(node)?);
            positions.insert(node.clone(), i);
        }
        Ok(Self { keys, positions })
    }

    /// Node keys in graph iteration order (duplicates kept).
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    /// Position of `node`, if it belongs to the keyed graph.
    pub fn position(&self, node: &NodeRef) -> Option<usize> {
        self.positions.get(node).copied()
    }

    /// Position of `node`, or [`PlanError::ForeignNode`].
    pub fn require(&self, node: &NodeRef) -> Result<usize, PlanError> {
        self.position(node).ok_or_else(|| PlanError::ForeignNode {
            target: node.target().clone(),
        })
    }

    /// Number of keyed nodes.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns `true` if the keyed graph had no nodes.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Stored node-key positions bound to a live graph's nodes.
///
/// Keys that occur more than once are paired by occurrence: the n-th stored
/// occurrence of a key binds to the n-th node with that key in the live
/// graph's iteration order.
#[derive(Debug)]
pub struct NodeBindings {
    keys: Vec<NodeKey>,
    nodes: Vec<NodeRef>,
}

impl NodeBindings {
    /// Bind `stored` keys against the nodes of `graph`, whose keys (in graph
    /// order) are `live`.
    ///
    /// Returns `None` unless the two key lists are equal as multisets; a
    /// partial binding would produce a plan for a different graph.
    pub fn bind(stored: Vec<NodeKey>, live: &NodeTable, graph: &DependencyGraph) -> Option<Self> {
        if stored.len() != live.len() || graph.len() != live.len() {
            return None;
        }
        let mut by_key: FxHashMap<&NodeKey, VecDeque<&NodeRef>> = FxHashMap::default();
        for (key, node) in live.keys().iter().zip(graph.nodes()) {
            by_key.entry(key).or_default().push_back(node);
        }
        let mut nodes = Vec::with_capacity(stored.len());
        for key in &stored {
            let node = by_key.get_mut(key)?.pop_front()?;
            nodes.push(node.clone());
        }
        Some(Self {
            keys: stored,
            nodes,
        })
    }

    /// Live node bound to stored position `index`.
    pub fn node(&self, index: usize) -> Result<&NodeRef, PlanError> {
        self.nodes.get(index).ok_or(PlanError::IndexOutOfRange {
            index,
            len: self.nodes.len(),
        })
    }

    /// Bound nodes in stored order.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Stored node keys.
    pub fn keys(&self) -> &[NodeKey] {
        &self.keys
    }

    /// Key-level view of the binding. For duplicated keys the first
    /// occurrence wins.
    pub fn nodes_by_key(&self) -> BTreeMap<&NodeKey, &NodeRef> {
        let mut map = BTreeMap::new();
        for (key, node) in self.keys.iter().zip(&self.nodes) {
            map.entry(key).or_insert(node);
        }
        map
    }

    /// Number of bound nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Executes a single node. Supplied by the executor.
pub trait NodeRunner: Send + Sync {
    /// Run `node`; an `Err` carries a human-readable reason.
    fn execute(&self, node: &NodeRef) -> Result<(), String>;
}

impl<F> NodeRunner for F
where
    F: Fn(&NodeRef) -> Result<(), String> + Send + Sync,
{
    fn execute(&self, node: &NodeRef) -> Result<(), String> {
        self(node)
    }
}

/// Receives per-node execution statistics. Supplied by the executor.
pub trait StatisticsGatherer: Send + Sync {
    /// `node` completed in `elapsed`.
    fn node_executed(&self, node: &NodeRef, elapsed: Duration);
    /// `node` failed with `message`.
    fn node_failed(&self, node: &NodeRef, message: &str);
}

/// Discards all statistics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStatistics;

impl StatisticsGatherer for NoopStatistics {
    fn node_executed(&self, _node: &NodeRef, _elapsed: Duration) {}
    fn node_failed(&self, _node: &NodeRef, _message: &str) {}
}

/// One recorded statistics event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Node completed.
    Executed(TargetSpecification),
    /// Node failed with the given message.
    Failed(TargetSpecification, String),
}

/// Records every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingStatistics {
    events: Mutex<Vec<NodeEvent>>,
}

impl RecordingStatistics {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<NodeEvent> {
        self.events.lock().clone()
    }

    /// Number of completed nodes.
    pub fn executed(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, NodeEvent::Executed(_)))
            .count()
    }
}

impl StatisticsGatherer for RecordingStatistics {
    fn node_executed(&self, node: &NodeRef, _elapsed: Duration) {
        self.events
            .lock()
            .push(NodeEvent::Executed(node.target().clone()));
    }

    fn node_failed(&self, node: &NodeRef, message: &str) {
        self.events
            .lock()
            .push(NodeEvent::Failed(node.target().clone(), message.to_owned()));
    }
}

/// Summary of one plan run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Nodes executed.
    pub executed: usize,
    /// Wall time spent in the runner.
    pub elapsed: Duration,
}
