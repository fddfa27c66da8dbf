// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural keys.
//!
//! [`NodeKey`] and [`GraphKey`] are value types derived from the
//! identity-bearing graph model. Two graphs built independently by the same
//! compiler produce equal keys; any change to a node's target, function,
//! inputs or outputs, to the terminal outputs, or to the epoch produces a
//! different key.
//!
//! # Canonical Encoding
//!
//! Keys encode to CBOR through `serde`. Every collection inside a key is a
//! `BTreeSet`/`BTreeMap`, so the encoding of equal keys is byte-identical and
//! can be used directly as a store key. [`GraphKey::store_key`] prefixes the
//! encoding with [`GRAPH_KEY_TAG`] so a layout change never aliases old
//! entries.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strand_depgraph::{DependencyGraph, DependencyNode};
use strand_store::{key_digest, KeyDigest};
use strand_value::{
    ParameterizedFunction, TargetSpecification, ValueRequirement, ValueSpecification,
};

/// Layout tag prepended to every encoded [`GraphKey`] used as a store key.
pub const GRAPH_KEY_TAG: [u8; 4] = *b"SGK1";

/// Errors produced while deriving or encoding keys.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    /// The node has no function assigned, so the graph is not fully compiled.
    #[error("[KEY_UNFUNCTIONED] node for {target} has no function assigned")]
    Unfunctioned {
        /// Target of the offending node.
        target: TargetSpecification,
    },
    /// CBOR encoding failed.
    #[error("[KEY_ENCODE] {0}")]
    Encode(String),
    /// CBOR decoding failed.
    #[error("[KEY_DECODE] {0}")]
    Decode(String),
    /// Bytes did not start with [`GRAPH_KEY_TAG`].
    #[error("[KEY_BAD_TAG] store key does not carry the graph key tag")]
    BadTag,
}

/// Value-equal fingerprint of a single [`DependencyNode`].
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeKey {
    target: TargetSpecification,
    function: ParameterizedFunction,
    inputs: BTreeSet<ValueSpecification>,
    outputs: BTreeSet<ValueSpecification>,
}

impl NodeKey {
    /// Derive the key of `node`.
    ///
    /// # Errors
    /// Returns [`KeyError::Unfunctioned`] if the node has no function; only
    /// fully compiled graphs can be keyed.
    pub fn from_node(node: &DependencyNode) -> Result<Self, KeyError> {
        let function = node
            .function()
            .ok_or_else(|| KeyError::Unfunctioned {
                target: node.target().clone(),
            })?
            .clone();
        Ok(Self {
            target: node.target().clone(),
            function,
            inputs: node.input_values().clone(),
            outputs: node.output_values().clone(),
        })
    }

    /// Assemble a key from its parts.
    pub fn new(
        target: TargetSpecification,
        function: impl Into<ParameterizedFunction>,
        inputs: impl IntoIterator<Item = ValueSpecification>,
        outputs: impl IntoIterator<Item = ValueSpecification>,
    ) -> Self {
        Self {
            target,
            function: function.into(),
            inputs: inputs.into_iter().collect(),
            outputs: outputs.into_iter().collect(),
        }
    }

    /// Target of the node.
    pub fn target(&self) -> &TargetSpecification {
        &self.target
    }

    /// Function the node applies.
    pub fn function(&self) -> &ParameterizedFunction {
        &self.function
    }

    /// Consumed values.
    pub fn inputs(&self) -> &BTreeSet<ValueSpecification> {
        &self.inputs
    }

    /// Produced values.
    pub fn outputs(&self) -> &BTreeSet<ValueSpecification> {
        &self.outputs
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {} ({} in, {} out)",
            self.function,
            self.target,
            self.inputs.len(),
            self.outputs.len()
        )
    }
}

/// Value-equal fingerprint of a whole [`DependencyGraph`] at an epoch.
///
/// Node keys form a set: two structurally identical nodes in one graph
/// collapse into a single member. The plan cache keeps the full ordered list
/// of node keys next to the stored plan to disambiguate them on rebind.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GraphKey {
    epoch: u64,
    nodes: BTreeSet<NodeKey>,
    terminal_outputs: BTreeMap<ValueRequirement, ValueSpecification>,
}

impl GraphKey {
    /// Derive the key of `graph` compiled against `epoch`.
    ///
    /// # Errors
    /// Returns [`KeyError::Unfunctioned`] for the first node without a
    /// function.
    pub fn new(graph: &DependencyGraph, epoch: u64) -> Result<Self, KeyError> {
        let nodes = graph
            .nodes()
            .iter()
            .map(|n| NodeKey::from_node(n))
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            epoch,
            nodes,
            terminal_outputs: graph.terminal_outputs().clone(),
        })
    }

    /// Assemble a key from already computed node keys.
    pub fn from_parts(
        epoch: u64,
        nodes: impl IntoIterator<Item = NodeKey>,
        terminal_outputs: BTreeMap<ValueRequirement, ValueSpecification>,
    ) -> Self {
        Self {
            epoch,
            nodes: nodes.into_iter().collect(),
            terminal_outputs,
        }
    }

    /// Function-repository epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Distinct node keys in canonical order.
    pub fn node_keys(&self) -> &BTreeSet<NodeKey> {
        &self.nodes
    }

    /// Terminal outputs in canonical order.
    pub fn terminal_outputs(&self) -> &BTreeMap<ValueRequirement, ValueSpecification> {
        &self.terminal_outputs
    }

    /// Canonical CBOR encoding.
    pub fn to_bytes(&self) -> Result<Vec<u8>, KeyError> {
        encode(self)
    }

    /// Decode a key produced by [`to_bytes`](Self::to_bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        decode(bytes)
    }

    /// Tagged encoding used as the key in a `PlanStore`.
    pub fn store_key(&self) -> Result<Vec<u8>, KeyError> {
        let mut out = GRAPH_KEY_TAG.to_vec();
        ciborium::ser::into_writer(self, &mut out).map_err(|e| KeyError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Decode a key produced by [`store_key`](Self::store_key).
    pub fn from_store_key(bytes: &[u8]) -> Result<Self, KeyError> {
        let body = bytes
            .strip_prefix(GRAPH_KEY_TAG.as_slice())
            .ok_or(KeyError::BadTag)?;
        decode(body)
    }

    /// BLAKE3 digest of the store key, as file-backed stores name entries.
    pub fn digest(&self) -> Result<KeyDigest, KeyError> {
        Ok(key_digest(&self.store_key()?))
    }
}

impl fmt::Display for GraphKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GraphKey(epoch={}, nodes={}, terminals={})",
            self.epoch,
            self.nodes.len(),
            self.terminal_outputs.len()
        )
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, KeyError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).map_err(|e| KeyError::Encode(e.to_string()))?;
    Ok(out)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, KeyError> {
    ciborium::de::from_reader(bytes).map_err(|e| KeyError::Decode(e.to_string()))
}
