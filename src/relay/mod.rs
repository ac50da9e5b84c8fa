//! Relay workflow engine.
//!
//! Workflows are named, ordered sequences of typed steps executed strictly
//! one after another. Steps share an append-only [`ExecutionContext`]; each
//! successful step's output lands under `step_<n>_result` for later steps
//! to reference through `{key}` placeholders. Completion-pattern steps
//! resolve prompts but never call a model; the caller decides how and
//! whether to complete them.

pub mod catalog;
pub mod context;
pub mod engine;
pub mod patterns;
pub mod triggers;
pub mod workflow;

pub use catalog::WorkflowCatalog;
pub use context::{ContextValue, ExecutionContext};
pub use engine::RelayEngine;
pub use patterns::{substitute, PatternLibrary, PromptPattern};
pub use triggers::TriggerTable;
pub use workflow::{
    StepAction, StepOutput, StepRecord, WorkflowDefinition, WorkflowOutcome, WorkflowStep,
};
