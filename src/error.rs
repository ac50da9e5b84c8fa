//! Error types for the orchestration core.

/// Top-level error type for the task orchestration system.
#[derive(Debug, thiserror::Error)]
pub enum BatonError {
    /// Backing job store unreachable or unreadable.
    #[error("job store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed cron schedule expression.
    #[error("invalid schedule: {0}")]
    Schedule(String),

    /// Handler name not present in the registry.
    #[error("unknown handler: {0}")]
    UnknownHandler(String),

    /// Workflow name not present in the catalog.
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// A workflow step reported failure.
    #[error("step failed: {0}")]
    Step(String),

    /// Completion provider reported rate limiting (or a timeout, which is
    /// treated the same for fallback purposes).
    #[error("provider rate limited: {0}")]
    RateLimited(String),

    /// Any other completion provider failure.
    #[error("provider error: {0}")]
    Provider(String),

    /// The completion attempt budget was spent without a success.
    #[error("providers exhausted after trying [{}]: {last_error}", .attempted.join(", "))]
    ProvidersExhausted {
        /// Every model attempted, in order.
        attempted: Vec<String>,
        /// The error from the final attempt.
        last_error: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, BatonError>;
