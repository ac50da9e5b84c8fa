//! Baton: task orchestration core.
//!
//! This crate provides the scheduling and relay-execution machinery for a
//! larger system: durable cron-style jobs, sequential multi-step workflows
//! with context passing, and rate-limit-aware fallback across
//! interchangeable completion providers.
//!
//! # Architecture
//!
//! Three subsystems, composed bottom-up:
//! - **Job store + scheduler**: jobs persist as `job:<id>` records in a
//!   JSON-document store; a polling loop matches five-field cron schedules
//!   against wall-clock time and dispatches due jobs to registered handlers.
//! - **Relay engine**: named workflows run their typed steps strictly in
//!   order, threading an append-only context; prompt-resolving steps defer
//!   the actual model call to the caller.
//! - **Providers**: a static priority table plus a bounded retry loop that
//!   rotates models on rate limits, reporting every model attempted.
//!
//! The [`runtime::Orchestrator`] ties the three together for inbound
//! messages.

pub mod config;
pub mod error;
pub mod providers;
pub mod relay;
pub mod runtime;
pub mod scheduler;
pub mod store;

pub use config::BatonConfig;
pub use error::{BatonError, Result};
pub use providers::{CompletionClient, HttpCompletionClient, ProviderTable};
pub use relay::{ExecutionContext, RelayEngine, TriggerTable, WorkflowOutcome};
pub use runtime::{MessageReply, Orchestrator};
pub use scheduler::{CronSchedule, HandlerRegistry, Job, JobHandler, Scheduler, SchedulerHandle};
pub use store::JobStore;
