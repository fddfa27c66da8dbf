// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for Strand crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`graphs`] - Node and graph builders, including the linear chain fixture
//! - [`runner`] - Node runner that records execution order
//! - [`store`] - Recording, failure-injecting `PlanStore` fake

pub mod graphs;
pub mod runner;
pub mod store;

pub use graphs::{chain_graph, chain_terminal, function_node, spec, target, NodeFixture, TEST_SCHEME};
pub use runner::RecordingRunner;
pub use store::RecordingStore;
