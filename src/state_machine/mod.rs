mod invocation;
mod state;
mod workflow;

pub use invocation::{AuditRecord, Invocation};
pub use state::{Route, Stage, StateMachine, Transition};
pub use workflow::{Condition, ErrorInfo, Report, StateUpdate, Status, Urgency, WorkflowState};
