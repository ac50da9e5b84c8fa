//! Rate-limit-aware provider fallback.
//!
//! Wraps a completion client with a bounded retry loop over the provider
//! table. A rate-limited model is marked failed and the next attempt uses
//! the selector's next pick; any other failure burns an attempt against the
//! same model. The loop always reports every model it actually called, in
//! order.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{BatonError, Result};
use crate::providers::client::{CompletionClient, CompletionRequest};
use crate::providers::selector::ProviderTable;

/// Default completion attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Prompt content and tuning for one fallback-managed completion.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatPrompt {
    /// System prompt.
    pub system_prompt: String,
    /// User prompt.
    pub user_prompt: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
}

impl ChatPrompt {
    /// Create a prompt with default tuning.
    #[must_use]
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 1200,
            temperature: 0.6,
        }
    }

    /// Override the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Override the sampling temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// A successful completion plus how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text.
    pub text: String,
    /// Model that produced the text.
    pub model: String,
    /// `true` when at least one earlier attempt failed.
    pub fallback_used: bool,
    /// Every model called, in call order, ending with the successful one.
    pub attempted_models: Vec<String>,
}

/// Completion runner with provider fallback.
pub struct ProviderFallback {
    client: Arc<dyn CompletionClient>,
    providers: ProviderTable,
    max_attempts: u32,
}

impl ProviderFallback {
    /// Create a runner over the given client and provider table.
    #[must_use]
    pub fn new(client: Arc<dyn CompletionClient>, providers: ProviderTable) -> Self {
        Self {
            client,
            providers,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Override the attempt budget (minimum 1).
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Run a completion, rotating providers on rate limits.
    ///
    /// `preferred` seeds the first selection. Returns
    /// [`BatonError::ProvidersExhausted`] with the ordered attempt list once
    /// the budget is spent.
    pub async fn complete(
        &self,
        preferred: Option<&str>,
        prompt: &ChatPrompt,
    ) -> Result<Completion> {
        let mut failed: Vec<String> = Vec::new();
        let mut attempted: Vec<String> = Vec::new();
        let mut model = self.providers.select(preferred, &failed);
        let mut last_error: Option<BatonError> = None;

        for attempt in 1..=self.max_attempts {
            attempted.push(model.clone());
            let request = CompletionRequest {
                model: model.clone(),
                system_prompt: prompt.system_prompt.clone(),
                user_prompt: prompt.user_prompt.clone(),
                max_tokens: prompt.max_tokens,
                temperature: prompt.temperature,
            };

            match self.client.complete(&request).await {
                Ok(text) => {
                    let fallback_used = attempted.len() > 1;
                    if fallback_used {
                        debug!(
                            model = %model,
                            attempts = attempted.len(),
                            "completion succeeded after fallback"
                        );
                    }
                    return Ok(Completion {
                        text,
                        model,
                        fallback_used,
                        attempted_models: attempted,
                    });
                }
                Err(BatonError::RateLimited(reason)) => {
                    warn!(
                        model = %model,
                        attempt,
                        "provider rate limited: {reason}"
                    );
                    failed.push(model.clone());
                    last_error = Some(BatonError::RateLimited(reason));
                    model = self.providers.select(None, &failed);
                }
                Err(err) => {
                    warn!(model = %model, attempt, "provider call failed: {err}");
                    // Not a rate limit: the selection stays as it is and the
                    // next attempt retries the same model.
                    last_error = Some(err);
                }
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts made".to_owned());
        Err(BatonError::ProvidersExhausted {
            attempted,
            last_error,
        })
    }
}

impl std::fmt::Debug for ProviderFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderFallback")
            .field("providers", &self.providers)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
