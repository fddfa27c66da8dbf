// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Value and target identifiers for Strand dependency graphs.
//!
//! Everything in this crate is an immutable value type: equality, ordering and
//! hashing are structural. The derived `Ord` impls define the canonical order
//! used wherever a collection of these values is serialized or digested, so two
//! independently built collections with the same members always encode to the
//! same bytes.
//!
//! # Layout
//!
//! - [`UniqueId`] / [`TargetSpecification`] name the real-world object a
//!   computation concerns.
//! - [`ValueProperties`] is the ordered property map carried by specifications
//!   (resolved properties) and requirements (constraints).
//! - [`ValueSpecification`] is a produced value; [`ValueRequirement`] is a
//!   requested one.
//! - [`FunctionId`] / [`ParameterizedFunction`] identify the function a node
//!   applies.
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

mod function;
mod ident;
mod properties;
mod value;

pub use function::{FunctionId, ParameterizedFunction};
pub use ident::{TargetKind, TargetSpecification, UniqueId, UNIQUE_ID_SEPARATOR};
pub use properties::{property_names, ValueProperties, ValuePropertiesBuilder};
pub use value::{ValueRequirement, ValueSpecification};

/// Errors produced while parsing textual identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    /// The text did not have the `scheme~value[~version]` shape.
    #[error("[VALUE_BAD_UNIQUE_ID] malformed unique id: {0:?}")]
    MalformedUniqueId(String),
    /// A required component was empty.
    #[error("[VALUE_EMPTY_COMPONENT] empty {component} in {text:?}")]
    EmptyComponent {
        /// Which component was empty (`scheme`, `value`, `version`).
        component: &'static str,
        /// The full text being parsed.
        text: String,
    },
}
