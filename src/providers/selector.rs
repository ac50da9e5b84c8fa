//! Provider descriptors and priority-based selection.

/// Default model returned when every known provider has failed.
pub const DEFAULT_MODEL: &str = "x-ai/grok-4.1-fast";

/// Static description of one completion provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderDescriptor {
    /// Model key sent to the completion endpoint.
    pub model: String,
    /// Human-readable name.
    pub name: String,
    /// Whether the model is free to call.
    pub free: bool,
    /// Advertised request budget per minute.
    pub rate_limit_per_min: u32,
    /// Priority rank; lower is preferred.
    pub priority: u32,
}

/// Read-only table of known providers plus a fixed default.
///
/// The table itself never changes at runtime; the only per-request state is
/// the caller's failed-model list passed into [`select`](Self::select).
#[derive(Debug, Clone)]
pub struct ProviderTable {
    providers: Vec<ProviderDescriptor>,
    default_model: String,
}

impl ProviderTable {
    /// Create an empty table with the given last-resort default model.
    #[must_use]
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            providers: Vec::new(),
            default_model: default_model.into(),
        }
    }

    /// Table with the stock providers in priority order.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new(DEFAULT_MODEL)
            .with_provider(ProviderDescriptor {
                model: "x-ai/grok-4.1-fast".to_owned(),
                name: "Grok 4.1 Fast".to_owned(),
                free: true,
                rate_limit_per_min: 60,
                priority: 1,
            })
            .with_provider(ProviderDescriptor {
                model: "qwen/qwen-2.5-coder-7b-instruct".to_owned(),
                name: "Qwen Coder 7B".to_owned(),
                free: true,
                rate_limit_per_min: 20,
                priority: 2,
            })
            .with_provider(ProviderDescriptor {
                model: "google/gemini-pro-1.5".to_owned(),
                name: "Gemini Pro 1.5".to_owned(),
                free: true,
                rate_limit_per_min: 15,
                priority: 3,
            })
            .with_provider(ProviderDescriptor {
                model: "anthropic/claude-3-haiku".to_owned(),
                name: "Claude 3 Haiku".to_owned(),
                free: false,
                rate_limit_per_min: 50,
                priority: 4,
            })
    }

    /// Add a provider.
    #[must_use]
    pub fn with_provider(mut self, provider: ProviderDescriptor) -> Self {
        self.providers.push(provider);
        self
    }

    /// Look up a provider by model key.
    #[must_use]
    pub fn get(&self, model: &str) -> Option<&ProviderDescriptor> {
        self.providers.iter().find(|p| p.model == model)
    }

    /// The last-resort default model.
    #[must_use]
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Model keys ordered by priority rank.
    #[must_use]
    pub fn models(&self) -> Vec<&str> {
        let mut ordered: Vec<&ProviderDescriptor> = self.providers.iter().collect();
        ordered.sort_by_key(|p| p.priority);
        ordered.into_iter().map(|p| p.model.as_str()).collect()
    }

    /// Pick a model for the next completion attempt.
    ///
    /// A preferred model not present in `failed` is returned as-is, even if
    /// the table does not know it. Otherwise the lowest-priority-rank
    /// provider not in `failed` wins; when every provider has failed, the
    /// fixed default is returned so the caller always gets some model.
    #[must_use]
    pub fn select(&self, preferred: Option<&str>, failed: &[String]) -> String {
        if let Some(preferred) = preferred
            && !failed.iter().any(|f| f == preferred)
        {
            return preferred.to_owned();
        }
        self.providers
            .iter()
            .filter(|p| !failed.iter().any(|f| f == &p.model))
            .min_by_key(|p| p.priority)
            .map_or_else(|| self.default_model.clone(), |p| p.model.clone())
    }
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn two_provider_table() -> ProviderTable {
        ProviderTable::new("model-a")
            .with_provider(ProviderDescriptor {
                model: "model-a".to_owned(),
                name: "A".to_owned(),
                free: true,
                rate_limit_per_min: 60,
                priority: 1,
            })
            .with_provider(ProviderDescriptor {
                model: "model-b".to_owned(),
                name: "B".to_owned(),
                free: true,
                rate_limit_per_min: 20,
                priority: 2,
            })
    }

    #[test]
    fn preferred_model_wins_when_not_failed() {
        let table = two_provider_table();
        assert_eq!(table.select(Some("model-b"), &[]), "model-b");
        // A preferred model the table does not know still comes back as-is.
        assert_eq!(table.select(Some("custom/model"), &[]), "custom/model");
    }

    #[test]
    fn failed_preferred_falls_back_to_priority_order() {
        let table = two_provider_table();
        let failed = vec!["model-b".to_owned()];
        assert_eq!(table.select(Some("model-b"), &failed), "model-a");
    }

    #[test]
    fn selection_skips_failed_providers() {
        let table = two_provider_table();
        assert_eq!(table.select(None, &[]), "model-a");
        let failed = vec!["model-a".to_owned()];
        assert_eq!(table.select(None, &failed), "model-b");
    }

    #[test]
    fn exhausted_table_returns_default() {
        let table = two_provider_table();
        let failed = vec!["model-a".to_owned(), "model-b".to_owned()];
        assert_eq!(table.select(None, &failed), "model-a");

        let empty = ProviderTable::new("last-resort");
        assert_eq!(empty.select(None, &[]), "last-resort");
    }

    #[test]
    fn builtin_table_orders_by_priority() {
        let table = ProviderTable::builtin();
        assert_eq!(
            table.models(),
            vec![
                "x-ai/grok-4.1-fast",
                "qwen/qwen-2.5-coder-7b-instruct",
                "google/gemini-pro-1.5",
                "anthropic/claude-3-haiku",
            ]
        );
        assert_eq!(table.default_model(), DEFAULT_MODEL);
        assert!(!table.get("anthropic/claude-3-haiku").expect("provider").free);
    }
}
