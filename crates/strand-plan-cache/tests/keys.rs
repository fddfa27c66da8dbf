// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural key tests: equality across rebuilds, discrimination of every
//! node field, and encoding round trips.
#![allow(missing_docs, clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use strand_depgraph::DependencyGraph;
use strand_dry_tests::{chain_graph, function_node, spec, NodeFixture};
use strand_plan_cache::{GraphKey, NodeKey};
use strand_value::{ParameterizedFunction, ValueRequirement};

fn node_key(fixture: NodeFixture) -> NodeKey {
    NodeKey::from_node(&fixture.build()).unwrap()
}

fn base() -> NodeFixture {
    NodeFixture::new("X")
        .function("Mock")
        .input("1")
        .input("2")
        .output("1")
        .output("2")
}

fn graph_of(name: &str, functions: &[&str]) -> DependencyGraph {
    let mut g = DependencyGraph::new(name);
    for f in functions {
        g.add_node(function_node(f));
    }
    g
}

// ── 1. NodeKey equality and discrimination ──────────────────────────────────

#[test]
fn node_key_equal_for_independent_nodes() {
    let a = node_key(base());
    let b = node_key(base());
    assert_eq!(a, b);
}

#[test]
fn node_key_ignores_spec_insertion_order() {
    let a = node_key(base());
    let b = node_key(
        NodeFixture::new("X")
            .function("Mock")
            .output("2")
            .input("2")
            .output("1")
            .input("1")
            .input("1"),
    );
    assert_eq!(a, b);
}

#[test]
fn node_key_differs_by_target() {
    let other = NodeFixture::new("Y")
        .function("Mock")
        .input("1")
        .input("2")
        .output("1")
        .output("2");
    assert_ne!(node_key(base()), node_key(other));
}

#[test]
fn node_key_differs_by_function() {
    let other = NodeFixture::new("X")
        .function("Other")
        .input("1")
        .input("2")
        .output("1")
        .output("2");
    assert_ne!(node_key(base()), node_key(other));

    let parameterized = NodeFixture::new("X")
        .function(ParameterizedFunction::new("Mock").with_parameter("shift", "1bp"))
        .input("1")
        .input("2")
        .output("1")
        .output("2");
    assert_ne!(node_key(base()), node_key(parameterized));
}

#[test]
fn node_key_differs_by_one_input() {
    let other = NodeFixture::new("X")
        .function("Mock")
        .input("1")
        .output("1")
        .output("2");
    assert_ne!(node_key(base()), node_key(other));
}

#[test]
fn node_key_differs_by_one_output() {
    let other = NodeFixture::new("X")
        .function("Mock")
        .input("1")
        .input("2")
        .output("1");
    assert_ne!(node_key(base()), node_key(other));
}

#[test]
fn node_key_works_in_hash_sets() {
    let set: std::collections::HashSet<_> = [node_key(base()), node_key(base())].into();
    assert_eq!(set.len(), 1);
}

// ── 2. GraphKey equality and discrimination ─────────────────────────────────

#[test]
fn graph_key_equal_for_independent_rebuilds() {
    let a = GraphKey::new(&chain_graph("a", 10), 0).unwrap();
    let b = GraphKey::new(&chain_graph("b", 10), 0).unwrap();
    assert_eq!(a, b);
}

#[test]
fn graph_key_differs_by_epoch() {
    let g = chain_graph("g", 10);
    assert_ne!(GraphKey::new(&g, 0).unwrap(), GraphKey::new(&g, 1).unwrap());
}

#[test]
fn graph_key_differs_by_terminal_outputs() {
    let mut a = graph_of("a", &["Mock"]);
    let mut b = graph_of("b", &["Mock"]);
    a.add_terminal_output(
        ValueRequirement::unconstrained("1", strand_dry_tests::target("X")),
        spec("1", "X", "Foo1"),
    );
    b.add_terminal_output(
        ValueRequirement::unconstrained("2", strand_dry_tests::target("X")),
        spec("2", "X", "Foo2"),
    );
    assert_ne!(GraphKey::new(&a, 0).unwrap(), GraphKey::new(&b, 0).unwrap());
}

#[test]
fn graph_key_differs_by_added_node() {
    let a = graph_of("a", &["Mock"]);
    let b = graph_of("b", &["Mock", "Other"]);
    assert_ne!(GraphKey::new(&a, 0).unwrap(), GraphKey::new(&b, 0).unwrap());
}

#[test]
fn graph_key_differs_by_node_topology() {
    let a = chain_graph("a", 10);
    let b = chain_graph("b", 9);
    assert_ne!(GraphKey::new(&a, 0).unwrap(), GraphKey::new(&b, 0).unwrap());
}

#[test]
fn graph_key_rejects_unfunctioned_nodes() {
    let mut g = DependencyGraph::new("g");
    g.add_node(NodeFixture::new("X").input("1").build());
    assert!(GraphKey::new(&g, 0).is_err());
}

// ── 3. Encoding round trips ─────────────────────────────────────────────────

#[test]
fn graph_key_round_trips_for_empty_single_and_chain() {
    for len in [0, 1, 10] {
        let key = GraphKey::new(&chain_graph("g", len), 7).unwrap();
        let bytes = key.to_bytes().unwrap();
        assert_eq!(GraphKey::from_bytes(&bytes).unwrap(), key, "len {len}");
        let tagged = key.store_key().unwrap();
        assert_eq!(GraphKey::from_store_key(&tagged).unwrap(), key, "len {len}");
    }
}

#[test]
fn graph_key_round_trips_with_shared_specs() {
    // Both nodes consume the same two values.
    let key = GraphKey::new(&graph_of("g", &["Mock", "Other"]), 0).unwrap();
    assert_eq!(GraphKey::from_bytes(&key.to_bytes().unwrap()).unwrap(), key);
}

#[test]
fn equal_keys_encode_identically() {
    let a = GraphKey::new(&chain_graph("a", 10), 0).unwrap();
    let b = GraphKey::new(&chain_graph("b", 10), 0).unwrap();
    assert_eq!(a.store_key().unwrap(), b.store_key().unwrap());
    assert_eq!(a.digest().unwrap(), b.digest().unwrap());
}

// ── 4. Properties ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn graph_key_independent_of_node_order(
        functions in prop::collection::vec("[A-E]", 1..8),
        seed in any::<u64>(),
    ) {
        let names: Vec<&str> = functions.iter().map(String::as_str).collect();
        let mut shuffled = names.clone();
        // Deterministic rotation stands in for a shuffle.
        let len = shuffled.len();
        shuffled.rotate_left(usize::try_from(seed % len as u64).unwrap());

        let a = GraphKey::new(&graph_of("a", &names), 0).unwrap();
        let b = GraphKey::new(&graph_of("b", &shuffled), 0).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.store_key().unwrap(), b.store_key().unwrap());
    }

    #[test]
    fn node_key_equal_iff_function_equal(f in "[a-z]{1,6}", g in "[a-z]{1,6}") {
        let a = node_key(NodeFixture::new("X").function(f.as_str()).input("1"));
        let b = node_key(NodeFixture::new("X").function(g.as_str()).input("1"));
        prop_assert_eq!(a == b, f == g);
    }
}
