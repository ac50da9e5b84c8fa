//! Workflow definitions and execution records.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::relay::context::{ContextValue, ExecutionContext};

/// Type-specific payload of a workflow step.
///
/// The variant decides how the engine runs the step; there is no free-form
/// discriminant string, so an unknown step type cannot survive
/// deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// Simulated command execution.
    Command {
        /// Command line the assigned agent would run.
        command: String,
    },
    /// Human checkpoint. Always succeeds with a description-only result.
    Manual,
    /// Resolve a prompt pattern against the current context.
    CompletionPattern {
        /// Pattern name in the [`PatternLibrary`](crate::relay::PatternLibrary).
        pattern: String,
    },
    /// Reference another workflow without running it.
    SubWorkflow {
        /// Name of the referenced workflow.
        workflow: String,
    },
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Command { .. } => "command",
            Self::Manual => "manual",
            Self::CompletionPattern { .. } => "completion_pattern",
            Self::SubWorkflow { .. } => "sub_workflow",
        };
        f.write_str(label)
    }
}

/// One step of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Human-readable description of the step.
    pub description: String,
    /// Agent role responsible for the step.
    pub agent: String,
    /// What the step actually does.
    #[serde(flatten)]
    pub action: StepAction,
}

impl WorkflowStep {
    /// Create a step.
    #[must_use]
    pub fn new(description: impl Into<String>, agent: impl Into<String>, action: StepAction) -> Self {
        Self {
            description: description.into(),
            agent: agent.into(),
            action,
        }
    }
}

/// A named, ordered sequence of steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Workflow name, used for lookup and trigger routing.
    pub name: String,
    /// Agent roles that participate in the workflow.
    #[serde(default)]
    pub agents: Vec<String>,
    /// Steps in execution order.
    pub steps: Vec<WorkflowStep>,
    /// Whether a completed run should be flagged for on-chain recording.
    #[serde(default)]
    pub record_on_chain: bool,
}

impl WorkflowDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        agents: Vec<String>,
        steps: Vec<WorkflowStep>,
    ) -> Self {
        Self {
            name: name.into(),
            agents,
            steps,
            record_on_chain: false,
        }
    }

    /// Flag completed runs for on-chain recording.
    #[must_use]
    pub fn with_chain_recording(mut self) -> Self {
        self.record_on_chain = true;
        self
    }
}

/// Output of a successfully executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    /// Plain text from a command or manual step.
    Text {
        /// The produced text.
        text: String,
    },
    /// A resolved prompt awaiting a completion call by the caller.
    Prompt {
        /// Role the completion should adopt.
        role: String,
        /// Fully substituted prompt text.
        prompt: String,
    },
    /// Reference to another workflow the caller may choose to run.
    Workflow {
        /// Name of the referenced workflow.
        workflow: String,
    },
}

impl StepOutput {
    /// Convert the output into the value stored under the step's context key.
    #[must_use]
    pub fn to_context_value(&self) -> ContextValue {
        match self {
            Self::Text { text } => ContextValue::Text(text.clone()),
            Self::Prompt { role, prompt } => {
                let mut record = BTreeMap::new();
                record.insert("role".to_owned(), ContextValue::Text(role.clone()));
                record.insert("prompt".to_owned(), ContextValue::Text(prompt.clone()));
                ContextValue::Record(record)
            }
            Self::Workflow { workflow } => {
                let mut record = BTreeMap::new();
                record.insert("workflow".to_owned(), ContextValue::Text(workflow.clone()));
                ContextValue::Record(record)
            }
        }
    }
}

/// Record of one attempted step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based position of the step in the workflow.
    pub step_number: usize,
    /// Description copied from the definition.
    pub description: String,
    /// Agent copied from the definition.
    pub agent: String,
    /// Whether the step succeeded.
    pub success: bool,
    /// Output when the step succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<StepOutput>,
    /// Error message when the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Final report of a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    /// Name of the workflow that ran.
    pub workflow: String,
    /// `true` when every step succeeded.
    pub success: bool,
    /// Number of steps that completed successfully.
    pub steps_completed: usize,
    /// Per-step records, including the failing step when one failed.
    pub results: Vec<StepRecord>,
    /// Error message from the failing step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the run was flagged for on-chain recording.
    pub blockchain_recorded: bool,
    /// Context as it stood when the run ended.
    pub context: ExecutionContext,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn step_action_tags_round_trip() {
        let step = WorkflowStep::new(
            "Build the release artifacts",
            "builder",
            StepAction::Command {
                command: "build --profile release".to_owned(),
            },
        );
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(json["type"], "command");
        assert_eq!(json["command"], "build --profile release");

        let back: WorkflowStep = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, step);
    }

    #[test]
    fn manual_step_serializes_without_payload() {
        let step = WorkflowStep::new("Sign off", "editor", StepAction::Manual);
        let json = serde_json::to_value(&step).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "description": "Sign off",
                "agent": "editor",
                "type": "manual",
            })
        );
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let json = serde_json::json!({
            "description": "Do something",
            "agent": "anyone",
            "type": "teleport",
        });
        assert!(serde_json::from_value::<WorkflowStep>(json).is_err());
    }

    #[test]
    fn prompt_output_becomes_record() {
        let output = StepOutput::Prompt {
            role: "analyst".to_owned(),
            prompt: "Summarize this".to_owned(),
        };
        let ContextValue::Record(record) = output.to_context_value() else {
            panic!("expected record");
        };
        assert_eq!(record.get("role"), Some(&ContextValue::Text("analyst".to_owned())));
        assert_eq!(
            record.get("prompt"),
            Some(&ContextValue::Text("Summarize this".to_owned()))
        );
    }

    #[test]
    fn text_output_becomes_text() {
        let output = StepOutput::Text {
            text: "done".to_owned(),
        };
        assert_eq!(output.to_context_value(), ContextValue::Text("done".to_owned()));
    }
}
