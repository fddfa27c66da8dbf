// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node and graph builders.

use strand_depgraph::{DependencyGraph, DependencyNode, NodeRef};
use strand_value::{
    property_names, ParameterizedFunction, TargetSpecification, UniqueId, ValueProperties,
    ValueRequirement, ValueSpecification,
};

/// Unique-id scheme used by every fixture target.
pub const TEST_SCHEME: &str = "Test";

/// Primitive target `Test~{id}`.
pub fn target(id: &str) -> TargetSpecification {
    TargetSpecification::primitive(UniqueId::of(TEST_SCHEME, id))
}

/// Value `name` on target `target_id`, produced by `function`.
pub fn spec(name: &str, target_id: &str, function: &str) -> ValueSpecification {
    ValueSpecification::new(
        name,
        target(target_id),
        ValueProperties::with(property_names::FUNCTION, function),
    )
}

/// Builder for a single [`DependencyNode`].
///
/// Inputs default to target `X` / function `Bar`, outputs to target `A` /
/// function `Foo`, which is the shape most key tests vary one field of.
///
/// ```
/// use strand_dry_tests::NodeFixture;
///
/// let node = NodeFixture::new("X").function("Mock").input("1").output("2").build();
/// assert_eq!(node.input_values().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct NodeFixture {
    target: TargetSpecification,
    function: Option<ParameterizedFunction>,
    inputs: Vec<ValueSpecification>,
    outputs: Vec<ValueSpecification>,
}

impl NodeFixture {
    /// Start a node for target `Test~{target_id}` with no function.
    pub fn new(target_id: &str) -> Self {
        Self {
            target: target(target_id),
            function: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Assign the node's function.
    pub fn function(mut self, function: impl Into<ParameterizedFunction>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Add input `name` on target `X` produced by `Bar`.
    pub fn input(self, name: &str) -> Self {
        self.input_spec(spec(name, "X", "Bar"))
    }

    /// Add output `name` on target `A` produced by `Foo`.
    pub fn output(self, name: &str) -> Self {
        self.output_spec(spec(name, "A", "Foo"))
    }

    /// Add an arbitrary input specification.
    pub fn input_spec(mut self, spec: ValueSpecification) -> Self {
        self.inputs.push(spec);
        self
    }

    /// Add an arbitrary output specification.
    pub fn output_spec(mut self, spec: ValueSpecification) -> Self {
        self.outputs.push(spec);
        self
    }

    /// Build the node.
    pub fn build(self) -> DependencyNode {
        let mut node = DependencyNode::new(self.target);
        if let Some(function) = self.function {
            node.set_function(function);
        }
        for input in self.inputs {
            node.add_input_value(input);
        }
        for output in self.outputs {
            node.add_output_value(output);
        }
        node
    }
}

/// The standard two-in/two-out node: target `X`, inputs `1`,`2`, outputs
/// `1`,`2`.
pub fn function_node(function: &str) -> DependencyNode {
    NodeFixture::new("X")
        .function(function)
        .input("1")
        .input("2")
        .output("1")
        .output("2")
        .build()
}

/// Linear chain of `len` nodes named `name`.
///
/// Node `i` applies `Foo{i}`, outputs value `i`, and (for `i > 0`) consumes
/// value `i-1` and lists node `i-1` as an explicit input node. Value `0` is
/// the single terminal output.
pub fn chain_graph(name: &str, len: usize) -> DependencyGraph {
    let mut graph = DependencyGraph::new(name);
    let mut previous: Option<NodeRef> = None;
    for i in 0..len {
        let function = format!("Foo{i}");
        let mut node = DependencyNode::new(target("X"));
        node.set_function(function.as_str());
        node.add_output_value(spec(&i.to_string(), "X", &function));
        if let Some(prev) = &previous {
            node.add_input_node(prev);
            node.add_input_value(spec(&(i - 1).to_string(), "X", &format!("Foo{}", i - 1)));
        }
        previous = Some(graph.add_node(node));
    }
    if len > 0 {
        let (requirement, spec) = chain_terminal(0);
        graph.add_terminal_output(requirement, spec);
    }
    graph
}

/// Terminal output pair for chain value `i`.
pub fn chain_terminal(i: usize) -> (ValueRequirement, ValueSpecification) {
    let name = i.to_string();
    (
        ValueRequirement::unconstrained(name.as_str(), target("X")),
        spec(&name, "X", &format!("Foo{i}")),
    )
}
