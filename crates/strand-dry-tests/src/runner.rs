// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Node runner fake that records what ran.

use std::sync::{Arc, Mutex};

use strand_depgraph::NodeRef;
use strand_plan_cache::NodeRunner;

/// Records the address of every node it runs, in order.
///
/// Comparing the recorded addresses against a graph's nodes shows which graph
/// a rebound plan actually executes against.
#[derive(Clone, Default)]
pub struct RecordingRunner {
    ran: Arc<Mutex<Vec<NodeRef>>>,
}

impl RecordingRunner {
    /// Create an empty runner.
    pub fn new() -> Self {
        Self::default()
    }

    /// Nodes run so far, in order.
    pub fn ran(&self) -> Vec<NodeRef> {
        self.ran.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Function names of the nodes run so far, in order.
    pub fn functions(&self) -> Vec<String> {
        self.ran()
            .iter()
            .map(|n| n.function().map(ToString::to_string).unwrap_or_default())
            .collect()
    }
}

impl NodeRunner for RecordingRunner {
    fn execute(&self, node: &NodeRef) -> Result<(), String> {
        self.ran
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(node.clone());
        Ok(())
    }
}
