// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Function application nodes.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

use strand_value::{ParameterizedFunction, TargetSpecification, ValueSpecification};

/// A single function application, built incrementally by the compiler.
///
/// A node is mutable only while it is owned by its builder. Handing it to
/// [`DependencyGraph::add_node`](crate::DependencyGraph::add_node) freezes it
/// behind a [`NodeRef`].
///
/// `DependencyNode` deliberately has no `PartialEq`: identity is a property of
/// the [`NodeRef`] handle.
pub struct DependencyNode {
    target: TargetSpecification,
    function: Option<ParameterizedFunction>,
    inputs: BTreeSet<ValueSpecification>,
    outputs: BTreeSet<ValueSpecification>,
    input_nodes: Vec<NodeRef>,
}

impl DependencyNode {
    /// Creates an empty node for `target` with no function assigned.
    pub fn new(target: TargetSpecification) -> Self {
        Self {
            target,
            function: None,
            inputs: BTreeSet::new(),
            outputs: BTreeSet::new(),
            input_nodes: Vec::new(),
        }
    }

    /// Assigns (or replaces) the function this node applies.
    pub fn set_function(&mut self, function: impl Into<ParameterizedFunction>) {
        self.function = Some(function.into());
    }

    /// Adds a consumed value. Re-adding an equal specification is a no-op.
    pub fn add_input_value(&mut self, spec: ValueSpecification) {
        self.inputs.insert(spec);
    }

    /// Adds a produced value. Re-adding an equal specification is a no-op.
    pub fn add_output_value(&mut self, spec: ValueSpecification) {
        self.outputs.insert(spec);
    }

    /// Records an explicit dependency on `node`. Duplicate handles are ignored.
    pub fn add_input_node(&mut self, node: &NodeRef) {
        if !self.input_nodes.iter().any(|n| n.ptr_eq(node)) {
            self.input_nodes.push(node.clone());
        }
    }

    /// Target the node computes for.
    pub fn target(&self) -> &TargetSpecification {
        &self.target
    }

    /// Assigned function, `None` until [`set_function`](Self::set_function).
    pub fn function(&self) -> Option<&ParameterizedFunction> {
        self.function.as_ref()
    }

    /// Consumed values in canonical order.
    pub fn input_values(&self) -> &BTreeSet<ValueSpecification> {
        &self.inputs
    }

    /// Produced values in canonical order.
    pub fn output_values(&self) -> &BTreeSet<ValueSpecification> {
        &self.outputs
    }

    /// Explicit input nodes in registration order.
    pub fn input_nodes(&self) -> &[NodeRef] {
        &self.input_nodes
    }
}

impl fmt::Debug for DependencyNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Input nodes are summarised; following them would print whole subgraphs.
        f.debug_struct("DependencyNode")
            .field("target", &self.target)
            .field("function", &self.function)
            .field("inputs", &self.inputs.len())
            .field("outputs", &self.outputs.len())
            .field("input_nodes", &self.input_nodes.len())
            .finish()
    }
}

/// Shared, frozen handle to a node owned by a graph.
///
/// Equality and hashing are by object identity: two handles are equal only if
/// they point at the same node.
#[derive(Clone)]
pub struct NodeRef(Arc<DependencyNode>);

impl NodeRef {
    pub(crate) fn new(node: DependencyNode) -> Self {
        Self(Arc::new(node))
    }

    /// Returns `true` if both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address of the node for the lifetime of the handle.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

impl Deref for NodeRef {
    type Target = DependencyNode;

    fn deref(&self) -> &DependencyNode {
        &self.0
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for NodeRef {}

impl Hash for NodeRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({:#x}) ", self.addr())?;
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_value::{UniqueId, ValueProperties};

    fn spec(name: &str) -> ValueSpecification {
        ValueSpecification::new(
            name,
            TargetSpecification::primitive(UniqueId::of("Test", "X")),
            ValueProperties::none(),
        )
    }

    #[test]
    fn sets_ignore_duplicate_specs() {
        let mut node = DependencyNode::new(TargetSpecification::null());
        node.add_input_value(spec("1"));
        node.add_input_value(spec("1"));
        node.add_output_value(spec("2"));
        assert_eq!(node.input_values().len(), 1);
        assert_eq!(node.output_values().len(), 1);
        assert!(node.function().is_none());
    }

    #[test]
    fn handles_compare_by_identity() {
        let a = NodeRef::new(DependencyNode::new(TargetSpecification::null()));
        let b = NodeRef::new(DependencyNode::new(TargetSpecification::null()));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn input_nodes_dedupe_by_identity() {
        let a = NodeRef::new(DependencyNode::new(TargetSpecification::null()));
        let mut n = DependencyNode::new(TargetSpecification::null());
        n.add_input_node(&a);
        n.add_input_node(&a);
        assert_eq!(n.input_nodes().len(), 1);
    }
}
