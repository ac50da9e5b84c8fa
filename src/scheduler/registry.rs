//! Typed job handler registry.
//!
//! Handlers are registered once at startup and looked up by name when a job
//! dispatches. Scheduling a job whose handler name is absent is a
//! configuration error surfaced at schedule time, not a silent no-op at
//! dispatch time.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// A unit of work the scheduler can dispatch.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute the handler with the job's opaque payload.
    ///
    /// Returns a short human-readable summary on success.
    async fn run(&self, data: Option<&serde_json::Value>) -> Result<String>;
}

/// Registry of named job handlers.
///
/// Cloning is shallow: handlers are shared through [`Arc`].
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Replaces any existing handler with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Look up a handler by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns `true` when a handler with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Names of all registered handlers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}
