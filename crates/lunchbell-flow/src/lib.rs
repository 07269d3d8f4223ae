pub mod builder;
pub mod gate;
pub mod graph;
pub mod message;
pub mod nodes;
pub mod runner;
pub mod scheduler;

pub use builder::{
    holiday_test_flow, menu_notification_flow, simple_menu_flow, special_menu_test_flow,
    Collaborators,
};
pub use gate::{DebugCheckNode, GatePolicy, Proceed};
pub use graph::{Flow, FlowBuilder, Node, NodeId, Outcome, RetryPolicy, RunReport, StepRecord};
pub use runner::{FlowFactory, RunOutcome, WorkflowRunner};
pub use scheduler::DailyScheduler;
