pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, OutreachApprovalFlow};
pub use states::{ApprovalEvent, ApprovalState, FlowAction, FlowContext, TransitionOutcome};
