// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Execution-plan cache for Strand dependency graphs.
//!
//! Planning a graph is expensive; running it is cheap. Successive evaluation
//! cycles usually rebuild a logically identical graph out of brand-new node
//! objects, so this crate recognises structurally equal graphs and hands back
//! a previously compiled plan rebound onto the new graph's nodes.
//!
//! # Pieces
//!
//! - [`NodeKey`] / [`GraphKey`]: value-equal fingerprints of identity-equal
//!   graph objects, with canonical CBOR encoding.
//! - [`ExecutionPlan`] / [`DetachedPlan`]: the planner's artifact and its
//!   serializable, graph-independent form. [`SequentialPlan`] is a reference
//!   implementation.
//! - [`ExecutionPlanCache`]: identity fast path plus structural lookup over
//!   any [`PlanStore`](strand_store::PlanStore).
//! - [`PlanCacheConfig`]: JSON configuration and store construction.
//!
//! # Correctness Invariant
//!
//! The cache never returns a plan for a graph it was not compiled for. When a
//! stored entry cannot be proven to match the caller's graph (undecodable,
//! different node multiset, failed rebind) the lookup is a miss.
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
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self,
    clippy::missing_errors_doc
)]

mod cache;
mod config;
mod keys;
mod plan;
mod sequential;
mod stats;

pub use cache::{
    summarize_entry, CacheError, CacheState, ExecutionPlanCache, StoredEntrySummary,
    STORED_PLAN_FORMAT,
};
pub use config::{open_store, ConfigError, PlanCacheConfig, StoreConfig};
pub use keys::{GraphKey, KeyError, NodeKey, GRAPH_KEY_TAG};
pub use plan::{
    DetachedPlan, ExecutionPlan, NodeBindings, NodeEvent, NodeRunner, NodeTable, NoopStatistics,
    PlanError, RecordingStatistics, RunReport, StatisticsGatherer,
};
pub use sequential::{DetachedSequentialPlan, SequentialPlan};
pub use stats::{CacheStatistics, CacheStatisticsSnapshot};
