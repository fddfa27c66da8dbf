// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dependency graphs.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustc_hash::FxHashMap;
use strand_value::{ValueRequirement, ValueSpecification};

use crate::node::{DependencyNode, NodeRef};
use crate::GraphError;

static NEXT_GRAPH_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// Identity token owned by exactly one [`DependencyGraph`].
///
/// Components that want to remember a graph without keeping it alive hold a
/// `Weak<GraphIdentity>`: once the graph is dropped the weak reference stops
/// upgrading. Ids are process-unique and never reused.
#[derive(Debug)]
pub struct GraphIdentity {
    id: u64,
}

impl GraphIdentity {
    fn allocate() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_GRAPH_IDENTITY.fetch_add(1, Ordering::Relaxed),
        })
    }

    /// Process-unique id of the owning graph.
    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A DAG of function nodes plus the map of terminal outputs it must deliver.
///
/// Node iteration order is insertion order; every order-sensitive query
/// (topological ordering, tie-breaks) derives from it, so two graphs built by
/// the same deterministic compiler iterate identically.
///
/// There is no `PartialEq` and no `Clone`: a graph is an entity, and a copy
/// would be a different entity.
pub struct DependencyGraph {
    name: String,
    identity: Arc<GraphIdentity>,
    nodes: Vec<NodeRef>,
    positions: FxHashMap<NodeRef, usize>,
    producers: FxHashMap<ValueSpecification, Vec<usize>>,
    terminal_outputs: BTreeMap<ValueRequirement, ValueSpecification>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            identity: GraphIdentity::allocate(),
            nodes: Vec::new(),
            positions: FxHashMap::default(),
            producers: FxHashMap::default(),
            terminal_outputs: BTreeMap::new(),
        }
    }

    /// Graph name (typically the calculation configuration it serves).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// This graph's identity token.
    pub fn identity(&self) -> &Arc<GraphIdentity> {
        &self.identity
    }

    /// Freezes `node` and adds it to the graph, returning its handle.
    pub fn add_node(&mut self, node: DependencyNode) -> NodeRef {
        let handle = NodeRef::new(node);
        let position = self.nodes.len();
        for output in handle.output_values() {
            self.producers
                .entry(output.clone())
                .or_default()
                .push(position);
        }
        self.positions.insert(handle.clone(), position);
        self.nodes.push(handle.clone());
        handle
    }

    /// Records that `requirement` is satisfied by `spec` at the graph boundary.
    ///
    /// Replaces any previous specification for an equal requirement.
    pub fn add_terminal_output(&mut self, requirement: ValueRequirement, spec: ValueSpecification) {
        self.terminal_outputs.insert(requirement, spec);
    }

    /// Terminal outputs in canonical order.
    pub fn terminal_outputs(&self) -> &BTreeMap<ValueRequirement, ValueSpecification> {
        &self.terminal_outputs
    }

    /// Distinct terminal output specifications.
    pub fn terminal_output_specifications(&self) -> BTreeSet<&ValueSpecification> {
        self.terminal_outputs.values().collect()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[NodeRef] {
        &self.nodes
    }

    /// Returns `true` if `node` belongs to this graph.
    pub fn contains(&self, node: &NodeRef) -> bool {
        self.positions.contains_key(node)
    }

    /// Insertion index of `node`.
    pub fn position_of(&self, node: &NodeRef) -> Option<usize> {
        self.positions.get(node).copied()
    }

    /// First node (in insertion order) that produces `spec`.
    pub fn node_producing(&self, spec: &ValueSpecification) -> Option<&NodeRef> {
        self.producers
            .get(spec)
            .and_then(|positions| positions.first())
            .map(|&p| &self.nodes[p])
    }

    /// Every value produced by some node of the graph.
    pub fn all_output_specifications(&self) -> BTreeSet<&ValueSpecification> {
        self.nodes
            .iter()
            .flat_map(|n| n.output_values().iter())
            .collect()
    }

    /// First node without an assigned function, with its insertion index.
    pub fn first_unfunctioned_node(&self) -> Option<(usize, &NodeRef)> {
        self.nodes
            .iter()
            .enumerate()
            .find(|(_, n)| n.function().is_none())
    }

    /// Nodes `node` depends on, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if `node` is not part of this graph.
    pub fn dependencies_of(&self, node: &NodeRef) -> Result<Vec<NodeRef>, GraphError> {
        let position = self.require(node)?;
        Ok(self
            .dependency_positions(position)
            .into_iter()
            .map(|p| self.nodes[p].clone())
            .collect())
    }

    /// Nodes that depend on `node`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNode`] if `node` is not part of this graph.
    pub fn dependents_of(&self, node: &NodeRef) -> Result<Vec<NodeRef>, GraphError> {
        let position = self.require(node)?;
        Ok((0..self.nodes.len())
            .filter(|&p| self.dependency_positions(p).contains(&position))
            .map(|p| self.nodes[p].clone())
            .collect())
    }

    /// Nodes with no dependencies (they only consume external inputs).
    pub fn leaf_nodes(&self) -> Vec<NodeRef> {
        (0..self.nodes.len())
            .filter(|&p| self.dependency_positions(p).is_empty())
            .map(|p| self.nodes[p].clone())
            .collect()
    }

    /// Nodes nothing else in the graph depends on.
    pub fn root_nodes(&self) -> Vec<NodeRef> {
        let mut depended_on = vec![false; self.nodes.len()];
        for p in 0..self.nodes.len() {
            for d in self.dependency_positions(p) {
                depended_on[d] = true;
            }
        }
        self.nodes
            .iter()
            .zip(depended_on)
            .filter(|(_, used)| !used)
            .map(|(n, _)| n.clone())
            .collect()
    }

    /// Orders nodes so every node follows all of its dependencies.
    ///
    /// Among nodes that are ready at the same time the one inserted first wins,
    /// so the order is a function of graph content and insertion order only.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Cycle`] if the implied edges are cyclic.
    pub fn topological_order(&self) -> Result<Vec<NodeRef>, GraphError> {
        let n = self.nodes.len();
        let mut pending = vec![0usize; n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (p, slot) in pending.iter_mut().enumerate() {
            let deps = self.dependency_positions(p);
            *slot = deps.len();
            for d in deps {
                dependents[d].push(p);
            }
        }

        let mut ready: BinaryHeap<Reverse<usize>> = pending
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c == 0)
            .map(|(p, _)| Reverse(p))
            .collect();
        let mut order = Vec::with_capacity(n);
        while let Some(Reverse(p)) = ready.pop() {
            order.push(self.nodes[p].clone());
            for &q in &dependents[p] {
                pending[q] -= 1;
                if pending[q] == 0 {
                    ready.push(Reverse(q));
                }
            }
        }

        if order.len() == n {
            Ok(order)
        } else {
            Err(GraphError::Cycle {
                remaining: n - order.len(),
            })
        }
    }

    fn require(&self, node: &NodeRef) -> Result<usize, GraphError> {
        self.position_of(node).ok_or_else(|| GraphError::UnknownNode {
            graph: self.name.clone(),
        })
    }

    /// Distinct, sorted positions of the nodes `position` depends on.
    fn dependency_positions(&self, position: usize) -> BTreeSet<usize> {
        let node = &self.nodes[position];
        let mut deps = BTreeSet::new();
        for input in node.input_values() {
            if let Some(producers) = self.producers.get(input) {
                deps.extend(producers.iter().copied().filter(|&p| p != position));
            }
        }
        for input in node.input_nodes() {
            if let Some(p) = self.position_of(input) {
                if p != position {
                    deps.insert(p);
                }
            }
        }
        deps
    }
}

impl fmt::Debug for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyGraph")
            .field("name", &self.name)
            .field("identity", &self.identity.id)
            .field("nodes", &self.nodes.len())
            .field("terminal_outputs", &self.terminal_outputs.len())
            .finish()
    }
}
