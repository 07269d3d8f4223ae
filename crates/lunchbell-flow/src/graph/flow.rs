use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use lunchbell_core::error::{LunchbellError, Result};
use lunchbell_core::types::{Action, SharedContext};

use super::node::{Node, RetryPolicy, Retrying, Step};

/// Handle to a node added to a [`FlowBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Outgoing edges of one node: at most one successor per label, plus an
/// optional default successor.
#[derive(Debug, Clone, Default)]
pub struct Transitions {
    labelled: HashMap<Action, NodeId>,
    default: Option<NodeId>,
}

impl Transitions {
    /// Exact label first, then the default successor. `None` ends the run.
    pub fn successor(&self, action: Action) -> Option<NodeId> {
        self.labelled.get(&action).copied().or(self.default)
    }

    fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.labelled.values().copied().chain(self.default)
    }
}

struct Slot {
    step: Box<dyn Step>,
    transitions: Transitions,
}

/// One executed step of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub node: String,
    pub action: Action,
    pub attempts: u32,
    pub degraded: bool,
    pub elapsed_ms: u64,
}

/// Result of running a flow to termination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Steps in execution order.
    pub steps: Vec<StepRecord>,
    pub total_elapsed_ms: u64,
}

impl RunReport {
    /// Node names in execution order.
    pub fn path(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.node.as_str()).collect()
    }

    pub fn visits(&self, node: &str) -> usize {
        self.steps.iter().filter(|s| s.node == node).count()
    }

    /// Labels returned by `node`, one per visit.
    pub fn actions_of(&self, node: &str) -> Vec<Action> {
        self.steps
            .iter()
            .filter(|s| s.node == node)
            .map(|s| s.action)
            .collect()
    }

    pub fn last(&self) -> Option<&StepRecord> {
        self.steps.last()
    }
}

/// Assembles nodes and transitions into a [`Flow`].
#[derive(Default)]
pub struct FlowBuilder {
    slots: Vec<Slot>,
    invalid_source: Option<NodeId>,
}

impl FlowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node wrapped in its retry policy.
    pub fn add<N: Node>(&mut self, node: N, policy: RetryPolicy) -> NodeId {
        let id = NodeId(self.slots.len());
        self.slots.push(Slot {
            step: Box::new(Retrying::new(node, policy)),
            transitions: Transitions::default(),
        });
        id
    }

    /// Set the default successor of `from`.
    pub fn then(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        if let Some(slot) = self.slots.get_mut(from.0) {
            slot.transitions.default = Some(to);
        } else {
            self.invalid_source = Some(from);
        }
        self
    }

    /// Set the successor of `from` for `action`. `Action::Default` sets the
    /// default successor.
    pub fn on(&mut self, from: NodeId, action: Action, to: NodeId) -> &mut Self {
        if action == Action::Default {
            return self.then(from, to);
        }
        if let Some(slot) = self.slots.get_mut(from.0) {
            if let Some(prev) = slot.transitions.labelled.insert(action, to) {
                debug!(%action, from = from.0, prev = prev.0, "Replacing transition");
            }
        } else {
            self.invalid_source = Some(from);
        }
        self
    }

    /// Validate every id and produce the flow.
    pub fn build(self, start: NodeId) -> Result<Flow> {
        let len = self.slots.len();
        if let Some(bad) = self.invalid_source {
            return Err(LunchbellError::Graph(format!(
                "transition from unknown node #{}",
                bad.0
            )));
        }
        if start.0 >= len {
            return Err(LunchbellError::Graph(format!(
                "start node #{} not in graph of {len} nodes",
                start.0
            )));
        }
        for slot in &self.slots {
            if let Some(bad) = slot.transitions.targets().find(|t| t.0 >= len) {
                return Err(LunchbellError::Graph(format!(
                    "node '{}' routes to unknown node #{}",
                    slot.step.name(),
                    bad.0
                )));
            }
        }
        Ok(Flow {
            slots: self.slots,
            start,
        })
    }
}

/// A directed graph of nodes walked from a start node until no successor
/// applies.
///
/// Cycles are allowed; a retry loop is bounded only by the gate policy.
pub struct Flow {
    slots: Vec<Slot>,
    start: NodeId,
}

impl Flow {
    pub fn builder() -> FlowBuilder {
        FlowBuilder::new()
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.slots.get(id.0).map(|s| s.step.name())
    }

    pub fn successor(&self, from: NodeId, action: Action) -> Option<NodeId> {
        self.slots
            .get(from.0)
            .and_then(|s| s.transitions.successor(action))
    }

    /// Run from the start node until a label has no successor.
    ///
    /// A prep or post failure aborts the run with that error.
    pub async fn run(&mut self, ctx: &mut SharedContext) -> Result<RunReport> {
        let start = Instant::now();
        let mut steps = Vec::new();
        let mut current = Some(self.start);

        while let Some(id) = current {
            let slot = &mut self.slots[id.0];
            let name = slot.step.name().to_string();
            info!(node = %name, "Executing node");

            let inv = slot.step.invoke(ctx).await?;
            current = slot.transitions.successor(inv.action);

            match current {
                Some(next) => debug!(
                    node = %name,
                    action = %inv.action,
                    next = %self.slots[next.0].step.name(),
                    "Following transition"
                ),
                None => debug!(node = %name, action = %inv.action, "No successor, flow complete"),
            }

            steps.push(StepRecord {
                node: name,
                action: inv.action,
                attempts: inv.attempts,
                degraded: inv.degraded,
                elapsed_ms: inv.elapsed_ms,
            });
        }

        let total_elapsed_ms = start.elapsed().as_millis() as u64;
        info!(steps = steps.len(), total_elapsed_ms, "Flow finished");

        Ok(RunReport {
            steps,
            total_elapsed_ms,
        })
    }
}
