//! Message triggers that route chat input to workflows.

/// Ordered table mapping trigger phrases to workflow names.
///
/// Detection is a case-insensitive substring match, first entry wins, so
/// put the more specific phrases first when two could both match.
#[derive(Debug, Clone, Default)]
pub struct TriggerTable {
    entries: Vec<(String, String)>,
}

impl TriggerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the stock triggers for the built-in workflows.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new()
            .with_trigger("/review", "content_review")
            .with_trigger("/digest", "daily_digest")
            .with_trigger("/release", "release_pipeline")
            .with_trigger("run the daily digest", "daily_digest")
            .with_trigger("review this submission", "content_review")
    }

    /// Append a trigger phrase for a workflow.
    #[must_use]
    pub fn with_trigger(mut self, phrase: impl Into<String>, workflow: impl Into<String>) -> Self {
        self.entries
            .push((phrase.into().to_lowercase(), workflow.into()));
        self
    }

    /// Find the workflow triggered by a message, if any.
    #[must_use]
    pub fn detect(&self, message: &str) -> Option<&str> {
        let message = message.to_lowercase();
        self.entries
            .iter()
            .find(|(phrase, _)| message.contains(phrase.as_str()))
            .map(|(_, workflow)| workflow.as_str())
    }
}
