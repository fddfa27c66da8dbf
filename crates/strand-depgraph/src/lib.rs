// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dependency graph model built by the function compiler.
//!
//! Nodes and graphs here are *entities*: equality is object identity, never
//! structure. Two compilations that produce logically identical graphs yield
//! graphs (and nodes) that compare unequal, which is what the compiler's own
//! uniqueness tracking relies on. Structural comparison lives in the plan
//! cache's derived key types instead.
//!
//! Edges are not stored. Node `a` depends on node `b` when `b` produces a value
//! `a` consumes, or when `b` was registered as one of `a`'s input nodes.
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
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::use_self
)]

mod graph;
mod node;

pub use graph::{DependencyGraph, GraphIdentity};
pub use node::{DependencyNode, NodeRef};

/// Errors raised by graph queries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    /// The implied edges contain a cycle; `remaining` nodes could not be ordered.
    #[error("[GRAPH_CYCLE] dependency cycle among {remaining} node(s)")]
    Cycle {
        /// Number of nodes left unordered.
        remaining: usize,
    },
    /// The node handle does not belong to this graph.
    #[error("[GRAPH_UNKNOWN_NODE] node is not part of graph {graph:?}")]
    UnknownNode {
        /// Graph name.
        graph: String,
    },
}
