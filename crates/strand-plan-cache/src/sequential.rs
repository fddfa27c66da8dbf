// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reference plan: run every node once, one at a time, in topological order.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use strand_depgraph::{DependencyGraph, NodeRef};
use tracing::debug;

use crate::plan::{
    DetachedPlan, ExecutionPlan, NodeBindings, NodeRunner, NodeTable, PlanError, RunReport,
    StatisticsGatherer,
};

/// Runs a graph's nodes sequentially in dependency order.
#[derive(Debug, Clone)]
pub struct SequentialPlan {
    steps: Vec<NodeRef>,
}

impl SequentialPlan {
    /// Compile `graph` into a sequential plan.
    ///
    /// # Errors
    /// [`PlanError::Graph`] if the graph has a cycle.
    pub fn compile(graph: &DependencyGraph) -> Result<Self, PlanError> {
        let steps = graph.topological_order()?;
        debug!(graph = graph.name(), steps = steps.len(), "compiled sequential plan");
        Ok(Self { steps })
    }

    /// Nodes in execution order.
    pub fn steps(&self) -> &[NodeRef] {
        &self.steps
    }
}

impl ExecutionPlan for SequentialPlan {
    type Detached = DetachedSequentialPlan;

    fn detach(&self, table: &NodeTable) -> Result<DetachedSequentialPlan, PlanError> {
        let steps = self
            .steps
            .iter()
            .map(|n| table.require(n))
            .collect::<Result<_, _>>()?;
        Ok(DetachedSequentialPlan { steps })
    }

    fn run(
        &self,
        runner: &dyn NodeRunner,
        stats: &dyn StatisticsGatherer,
    ) -> Result<RunReport, PlanError> {
        let started = Instant::now();
        for node in &self.steps {
            let t0 = Instant::now();
            if let Err(message) = runner.execute(node) {
                stats.node_failed(node, &message);
                return Err(PlanError::NodeFailed {
                    target: node.target().clone(),
                    message,
                });
            }
            stats.node_executed(node, t0.elapsed());
        }
        Ok(RunReport {
            executed: self.steps.len(),
            elapsed: started.elapsed(),
        })
    }
}

/// [`SequentialPlan`] with steps stored as node-list positions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetachedSequentialPlan {
    steps: Vec<usize>,
}

impl DetachedSequentialPlan {
    /// Step positions in execution order.
    pub fn steps(&self) -> &[usize] {
        &self.steps
    }
}

impl DetachedPlan for DetachedSequentialPlan {
    type Plan = SequentialPlan;

    fn rebind(self, bindings: &NodeBindings) -> Result<SequentialPlan, PlanError> {
        let steps = self
            .steps
            .into_iter()
            .map(|i| bindings.node(i).cloned())
            .collect::<Result<_, _>>()?;
        Ok(SequentialPlan { steps })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::plan::RecordingStatistics;
    use strand_depgraph::DependencyNode;
    use strand_value::{TargetSpecification, UniqueId, ValueProperties, ValueSpecification};

    fn spec(name: &str) -> ValueSpecification {
        ValueSpecification::new(name, TargetSpecification::null(), ValueProperties::none())
    }

    fn diamond() -> DependencyGraph {
        let mut g = DependencyGraph::new("diamond");
        for (f, ins, outs) in [
            ("Sink", &["b", "c"][..], &["d"][..]),
            ("Left", &["a"][..], &["b"][..]),
            ("Right", &["a"][..], &["c"][..]),
            ("Source", &[][..], &["a"][..]),
        ] {
            let mut n = DependencyNode::new(TargetSpecification::primitive(UniqueId::of("T", f)));
            n.set_function(f);
            for i in ins {
                n.add_input_value(spec(i));
            }
            for o in outs {
                n.add_output_value(spec(o));
            }
            g.add_node(n);
        }
        g
    }

    fn names(plan: &SequentialPlan) -> Vec<String> {
        plan.steps()
            .iter()
            .map(|n| n.function().unwrap().to_string())
            .collect()
    }

    #[test]
    fn compiles_in_dependency_order() {
        let plan = SequentialPlan::compile(&diamond()).unwrap();
        assert_eq!(names(&plan), ["Source", "Left", "Right", "Sink"]);
    }

    #[test]
    fn detach_then_rebind_onto_same_graph() {
        let g = diamond();
        let plan = SequentialPlan::compile(&g).unwrap();
        let table = NodeTable::new(&g).unwrap();
        let detached = plan.detach(&table).unwrap();
        assert_eq!(detached.steps(), [3, 1, 2, 0]);
        let bindings = NodeBindings::bind(table.keys().to_vec(), &table, &g).unwrap();
        let rebound = detached.rebind(&bindings).unwrap();
        assert!(rebound
            .steps()
            .iter()
            .zip(plan.steps())
            .all(|(a, b)| a.ptr_eq(b)));
    }

    #[test]
    fn run_reports_every_node() {
        let plan = SequentialPlan::compile(&diamond()).unwrap();
        let stats = RecordingStatistics::new();
        let runner = |_: &NodeRef| -> Result<(), String> { Ok(()) };
        let report = plan.run(&runner, &stats).unwrap();
        assert_eq!(report.executed, 4);
        assert_eq!(stats.executed(), 4);
    }

    #[test]
    fn run_stops_at_first_failure() {
        let plan = SequentialPlan::compile(&diamond()).unwrap();
        let stats = RecordingStatistics::new();
        let runner = |n: &NodeRef| -> Result<(), String> {
            if n.function().is_some_and(|f| f.to_string() == "Left") {
                Err("boom".into())
            } else {
                Ok(())
            }
        };
        let err = plan.run(&runner, &stats).unwrap_err();
        assert!(matches!(err, PlanError::NodeFailed { ref message, .. } if message == "boom"));
        assert_eq!(stats.executed(), 1);
    }
}
