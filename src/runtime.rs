//! Message-level orchestration.
//!
//! The [`Orchestrator`] is the composition root for inbound messages: it
//! routes trigger phrases to relay workflows and everything else to a plain
//! chat completion. Prompt outputs from workflow steps are completed here,
//! through the same provider fallback the chat path uses; the engine itself
//! stays network-free.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ProviderConfig;
use crate::error::Result;
use crate::providers::{ChatPrompt, CompletionClient, ProviderFallback, ProviderTable};
use crate::relay::{ExecutionContext, RelayEngine, StepOutput, TriggerTable, WorkflowOutcome};

/// Model label reported when a workflow ran without any completion calls.
pub const WORKFLOW_EXECUTOR: &str = "workflow-executor";

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are the orchestrator's assistant. Answer clearly and concisely.";

/// Reply to one inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageReply {
    /// Text to send back.
    pub reply: String,
    /// Model that produced the reply, or [`WORKFLOW_EXECUTOR`].
    pub model: String,
    /// `true` when any completion needed a retry.
    pub fallback_used: bool,
    /// Every model attempted across all completion calls, in order.
    pub attempted_models: Vec<String>,
    /// Workflow that handled the message, when one was triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<String>,
    /// Full workflow report, when one was triggered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<WorkflowOutcome>,
}

/// Routes messages to workflows or chat completions.
#[derive(Debug)]
pub struct Orchestrator {
    engine: RelayEngine,
    triggers: TriggerTable,
    fallback: ProviderFallback,
    max_tokens: u32,
    temperature: f64,
    system_prompt: String,
}

impl Orchestrator {
    /// Orchestrator over the stock catalog, patterns, triggers and providers.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, config: &ProviderConfig) -> Self {
        Self::with_parts(
            RelayEngine::builtin(),
            TriggerTable::builtin(),
            ProviderTable::builtin(),
            client,
            config,
        )
    }

    /// Orchestrator over explicit parts.
    #[must_use]
    pub fn with_parts(
        engine: RelayEngine,
        triggers: TriggerTable,
        providers: ProviderTable,
        client: Arc<dyn CompletionClient>,
        config: &ProviderConfig,
    ) -> Self {
        let fallback =
            ProviderFallback::new(client, providers).with_max_attempts(config.max_attempts);
        Self {
            engine,
            triggers,
            fallback,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Override the chat system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The workflow engine behind this orchestrator.
    #[must_use]
    pub fn engine(&self) -> &RelayEngine {
        &self.engine
    }

    /// Handle one inbound message.
    ///
    /// A message containing a trigger phrase runs the matching workflow; any
    /// other message gets a single chat completion. `preferred_model` seeds
    /// provider selection for every completion made on behalf of the
    /// message.
    pub async fn handle_message(
        &self,
        message: &str,
        preferred_model: Option<&str>,
    ) -> Result<MessageReply> {
        if let Some(workflow) = self.triggers.detect(message) {
            let workflow = workflow.to_owned();
            info!(workflow = %workflow, "message triggered workflow");
            let initial = ExecutionContext::new().with("user_message", message);
            return self.run_workflow(&workflow, initial, preferred_model).await;
        }

        debug!("no trigger matched; running chat completion");
        let prompt = ChatPrompt::new(self.system_prompt.clone(), message)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);
        let completion = self.fallback.complete(preferred_model, &prompt).await?;
        Ok(MessageReply {
            reply: completion.text,
            model: completion.model,
            fallback_used: completion.fallback_used,
            attempted_models: completion.attempted_models,
            workflow: None,
            outcome: None,
        })
    }

    /// Run a workflow and complete every prompt its steps resolved.
    ///
    /// Completions run after the workflow finishes, one per prompt output,
    /// in step order. Sub-workflow references are reported in the reply but
    /// never executed here.
    pub async fn run_workflow(
        &self,
        name: &str,
        initial_context: ExecutionContext,
        preferred_model: Option<&str>,
    ) -> Result<MessageReply> {
        let outcome = self.engine.execute(name, initial_context)?;

        let mut attempted_models = Vec::new();
        let mut fallback_used = false;
        let mut model = WORKFLOW_EXECUTOR.to_owned();
        let mut completions: Vec<(usize, String)> = Vec::new();

        for record in &outcome.results {
            if let Some(StepOutput::Prompt { role, prompt }) = &record.output {
                let chat = ChatPrompt::new(format!("You are acting as: {role}."), prompt.clone())
                    .with_max_tokens(self.max_tokens)
                    .with_temperature(self.temperature);
                let completion = self.fallback.complete(preferred_model, &chat).await?;
                attempted_models.extend(completion.attempted_models);
                fallback_used |= completion.fallback_used;
                model = completion.model;
                completions.push((record.step_number, completion.text));
            }
        }

        Ok(MessageReply {
            reply: format_reply(&outcome, &completions),
            model,
            fallback_used,
            attempted_models,
            workflow: Some(outcome.workflow.clone()),
            outcome: Some(outcome),
        })
    }
}

fn format_reply(outcome: &WorkflowOutcome, completions: &[(usize, String)]) -> String {
    let mut lines = Vec::new();
    if outcome.success {
        lines.push(format!(
            "workflow \"{}\" completed ({} steps)",
            outcome.workflow, outcome.steps_completed
        ));
    } else {
        let error = outcome.error.as_deref().unwrap_or("unknown error");
        lines.push(format!(
            "workflow \"{}\" failed at step {}: {error}",
            outcome.workflow,
            outcome.steps_completed + 1
        ));
    }
    if outcome.blockchain_recorded {
        lines.push("run flagged for on-chain recording".to_owned());
    }
    for record in &outcome.results {
        let mark = if record.success { "ok" } else { "failed" };
        let extra = match &record.output {
            Some(StepOutput::Workflow { workflow }) => format!(" -> sub-workflow {workflow}"),
            _ => String::new(),
        };
        lines.push(format!(
            "{}. {} ({}) - {mark}{extra}",
            record.step_number, record.description, record.agent
        ));
    }
    for (step_number, text) in completions {
        lines.push(format!("step {step_number} completion: {text}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::error::BatonError;
    use crate::providers::CompletionRequest;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedClient {
        responses: Mutex<VecDeque<Result<String>>>,
        calls: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<CompletionRequest> {
            self.calls.lock().expect("lock").clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.calls.lock().expect("lock").push(request.clone());
            self.responses
                .lock()
                .expect("lock")
                .pop_front()
                .unwrap_or_else(|| Err(BatonError::Provider("script exhausted".to_owned())))
        }
    }

    fn orchestrator(responses: Vec<Result<String>>) -> (Arc<ScriptedClient>, Orchestrator) {
        let client = Arc::new(ScriptedClient::new(responses));
        let orchestrator = Orchestrator::new(client.clone(), &ProviderConfig::default());
        (client, orchestrator)
    }

    #[tokio::test]
    async fn plain_message_gets_chat_completion() {
        let (client, orchestrator) = orchestrator(vec![Ok("hello there".to_owned())]);

        let reply = orchestrator
            .handle_message("how are you today?", None)
            .await
            .expect("reply");
        assert_eq!(reply.reply, "hello there");
        assert_eq!(reply.model, "x-ai/grok-4.1-fast");
        assert!(!reply.fallback_used);
        assert!(reply.workflow.is_none());
        assert!(reply.outcome.is_none());

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].user_prompt, "how are you today?");
        assert_eq!(calls[0].max_tokens, 1200);
    }

    #[tokio::test]
    async fn trigger_runs_workflow_and_completes_prompts() {
        let (client, orchestrator) = orchestrator(vec![Ok("digest text".to_owned())]);

        let reply = orchestrator
            .handle_message("please /digest now", None)
            .await
            .expect("reply");
        assert_eq!(reply.workflow.as_deref(), Some("daily_digest"));
        let outcome = reply.outcome.expect("outcome");
        assert!(outcome.success);
        assert_eq!(outcome.steps_completed, 3);

        // The summarize step is the only prompt in the stock digest workflow.
        assert_eq!(reply.model, "x-ai/grok-4.1-fast");
        assert_eq!(reply.attempted_models, vec!["x-ai/grok-4.1-fast"]);
        assert!(reply.reply.contains("daily_digest"));
        assert!(reply.reply.contains("digest text"));

        let calls = client.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].system_prompt.contains("analyst"));
    }

    #[tokio::test]
    async fn chat_rate_limit_rotates_models() {
        let (client, orchestrator) = orchestrator(vec![
            Err(BatonError::RateLimited("spent".to_owned())),
            Ok("eventually".to_owned()),
        ]);

        let reply = orchestrator
            .handle_message("no trigger here", None)
            .await
            .expect("reply");
        assert_eq!(reply.reply, "eventually");
        assert_eq!(reply.model, "qwen/qwen-2.5-coder-7b-instruct");
        assert!(reply.fallback_used);
        assert_eq!(
            reply.attempted_models,
            vec!["x-ai/grok-4.1-fast", "qwen/qwen-2.5-coder-7b-instruct"]
        );
        assert_eq!(client.calls().len(), 2);
    }

    #[tokio::test]
    async fn preferred_model_is_used_first() {
        let (client, orchestrator) = orchestrator(vec![Ok("sure".to_owned())]);

        let reply = orchestrator
            .handle_message("just chatting", Some("custom/model"))
            .await
            .expect("reply");
        assert_eq!(reply.model, "custom/model");
        assert_eq!(client.calls()[0].model, "custom/model");
    }

    #[tokio::test]
    async fn unknown_workflow_is_an_error() {
        let (_client, orchestrator) = orchestrator(Vec::new());

        let err = orchestrator
            .run_workflow("no_such_workflow", ExecutionContext::new(), None)
            .await
            .expect_err("should fail");
        assert!(matches!(err, BatonError::WorkflowNotFound(_)));
    }

    #[tokio::test]
    async fn failed_workflow_reports_without_completions() {
        use crate::relay::{
            PatternLibrary, StepAction, WorkflowCatalog, WorkflowDefinition, WorkflowStep,
        };

        let broken = WorkflowDefinition::new(
            "broken",
            vec!["analyst".to_owned()],
            vec![
                WorkflowStep::new("Step one", "analyst", StepAction::Manual),
                WorkflowStep::new(
                    "Step two",
                    "analyst",
                    StepAction::CompletionPattern {
                        pattern: "missing".to_owned(),
                    },
                ),
            ],
        );
        let engine = RelayEngine::new(
            WorkflowCatalog::new().with_workflow(broken),
            PatternLibrary::new(),
        );
        let client = Arc::new(ScriptedClient::new(Vec::new()));
        let orchestrator = Orchestrator::with_parts(
            engine,
            TriggerTable::new().with_trigger("/broken", "broken"),
            ProviderTable::builtin(),
            client.clone(),
            &ProviderConfig::default(),
        );

        let reply = orchestrator
            .handle_message("/broken", None)
            .await
            .expect("reply");
        assert_eq!(reply.model, WORKFLOW_EXECUTOR);
        assert!(reply.attempted_models.is_empty());
        assert!(reply.reply.contains("failed at step 2"));
        assert!(client.calls().is_empty());
    }
}
