//! Completion providers: selection, transport, and fallback.
//!
//! A static [`ProviderTable`] ranks interchangeable models;
//! [`ProviderFallback`] drives a bounded retry loop over it, rotating to the
//! next rank when a model reports rate limiting (timeouts count). The actual
//! HTTP call lives behind the [`CompletionClient`] trait so the loop can be
//! exercised without a network.

pub mod client;
pub mod fallback;
pub mod selector;

pub use client::{CompletionClient, CompletionRequest, HttpCompletionClient};
pub use fallback::{ChatPrompt, Completion, ProviderFallback, DEFAULT_MAX_ATTEMPTS};
pub use selector::{ProviderDescriptor, ProviderTable, DEFAULT_MODEL};
