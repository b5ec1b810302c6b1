//! Data model shared by every component (`spec.md` §3).

pub mod action;
pub mod budgets;
pub mod memory;
pub mod outcome;
pub mod run_record;
pub mod scenario;
pub mod sdom;
pub mod tool_descriptor;

pub use action::{Action, ElementTarget};
pub use budgets::Budgets;
pub use memory::{Record, SharedMemory};
pub use outcome::{ProbeResult, ValidationOutcome};
pub use run_record::{RunRecord, RunStatus, ScenarioResult, StepResult};
pub use scenario::{Constraints, Goal, Precondition, ScenarioContext, ScenarioSpec};
pub use sdom::{
    ChangedElement, ContentElement, ElementKind, FeedbackKind, FeedbackMessage,
    InteractiveElement, Observation, Sdelta, Sdom, UrlTransition,
};
pub use tool_descriptor::ToolDescriptor;
