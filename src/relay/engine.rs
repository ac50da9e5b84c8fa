//! Sequential workflow executor.
//!
//! The engine runs one workflow at a time, step by step, in definition
//! order. There is no parallelism and no retry: a failing step stops the
//! run, and the report says how far it got. Completion-pattern steps only
//! resolve the prompt; issuing the completion call is the caller's job, so
//! the engine itself never touches the network.

use tracing::{debug, info, warn};

use crate::error::{BatonError, Result};
use crate::relay::catalog::WorkflowCatalog;
use crate::relay::context::ExecutionContext;
use crate::relay::patterns::{substitute, PatternLibrary};
use crate::relay::workflow::{
    StepAction, StepOutput, StepRecord, WorkflowOutcome, WorkflowStep,
};

/// Executes workflows from a catalog, resolving prompts from a pattern
/// library.
#[derive(Debug, Clone)]
pub struct RelayEngine {
    catalog: WorkflowCatalog,
    patterns: PatternLibrary,
}

impl RelayEngine {
    /// Create an engine over the given catalog and pattern library.
    #[must_use]
    pub fn new(catalog: WorkflowCatalog, patterns: PatternLibrary) -> Self {
        Self { catalog, patterns }
    }

    /// Engine with the stock catalog and patterns.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(WorkflowCatalog::builtin(), PatternLibrary::builtin())
    }

    /// The catalog this engine executes from.
    #[must_use]
    pub fn catalog(&self) -> &WorkflowCatalog {
        &self.catalog
    }

    /// Run the named workflow to completion or first failure.
    ///
    /// Returns `Err` only when the workflow name is unknown. A failing step
    /// is reported through the outcome instead: `success` is `false`,
    /// `steps_completed` counts the steps before the failure, and `results`
    /// ends with the failing step's record. After each successful step the
    /// context gains a `step_<n>_result` entry (1-based); a key the caller
    /// already seeded is left untouched.
    pub fn execute(
        &self,
        workflow_name: &str,
        initial_context: ExecutionContext,
    ) -> Result<WorkflowOutcome> {
        let Some(workflow) = self.catalog.get(workflow_name) else {
            return Err(BatonError::WorkflowNotFound(workflow_name.to_owned()));
        };

        info!(
            workflow = %workflow.name,
            steps = workflow.steps.len(),
            "executing workflow"
        );

        let mut context = initial_context;
        let mut results = Vec::with_capacity(workflow.steps.len());

        for (index, step) in workflow.steps.iter().enumerate() {
            let step_number = index + 1;
            debug!(
                workflow = %workflow.name,
                step = step_number,
                kind = %step.action,
                agent = %step.agent,
                "running step"
            );

            match self.run_step(step, &context) {
                Ok(output) => {
                    let key = format!("step_{step_number}_result");
                    if !context.append(key.clone(), output.to_context_value()) {
                        debug!(key = %key, "context key already present; keeping seeded value");
                    }
                    results.push(StepRecord {
                        step_number,
                        description: step.description.clone(),
                        agent: step.agent.clone(),
                        success: true,
                        output: Some(output),
                        error: None,
                    });
                }
                Err(err) => {
                    let message = err.to_string();
                    warn!(
                        workflow = %workflow.name,
                        step = step_number,
                        "step failed: {message}"
                    );
                    results.push(StepRecord {
                        step_number,
                        description: step.description.clone(),
                        agent: step.agent.clone(),
                        success: false,
                        output: None,
                        error: Some(message.clone()),
                    });
                    return Ok(WorkflowOutcome {
                        workflow: workflow.name.clone(),
                        success: false,
                        steps_completed: step_number - 1,
                        results,
                        error: Some(message),
                        blockchain_recorded: false,
                        context,
                    });
                }
            }
        }

        info!(
            workflow = %workflow.name,
            steps_completed = workflow.steps.len(),
            "workflow complete"
        );
        Ok(WorkflowOutcome {
            workflow: workflow.name.clone(),
            success: true,
            steps_completed: workflow.steps.len(),
            results,
            error: None,
            blockchain_recorded: workflow.record_on_chain,
            context,
        })
    }

    fn run_step(&self, step: &WorkflowStep, context: &ExecutionContext) -> Result<StepOutput> {
        match &step.action {
            StepAction::Command { .. } => Ok(StepOutput::Text {
                text: format!("executed: {}", step.description),
            }),
            StepAction::Manual => Ok(StepOutput::Text {
                text: step.description.clone(),
            }),
            StepAction::CompletionPattern { pattern } => {
                let Some(found) = self.patterns.get(pattern) else {
                    return Err(BatonError::Step(format!("unknown pattern: {pattern}")));
                };
                Ok(StepOutput::Prompt {
                    role: found.role.clone(),
                    prompt: substitute(&found.template, context),
                })
            }
            StepAction::SubWorkflow { workflow } => Ok(StepOutput::Workflow {
                workflow: workflow.clone(),
            }),
        }
    }
}
