pub mod flow;
pub mod node;

pub use flow::{Flow, FlowBuilder, NodeId, RunReport, StepRecord, Transitions};
pub use node::{Invocation, Node, Outcome, RetryPolicy, Retrying, Step};
