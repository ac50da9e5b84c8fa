//! Recurring job scheduling.
//!
//! Jobs live in the durable [`JobStore`](crate::store::JobStore); the
//! [`Scheduler`] polls it on a fixed period, matches each job's five-field
//! cron expression against wall-clock time, and dispatches due jobs to
//! handlers resolved through a typed [`HandlerRegistry`].

pub mod cron;
pub mod job;
pub mod registry;
pub mod runner;

pub use cron::CronSchedule;
pub use job::Job;
pub use registry::{HandlerRegistry, JobHandler};
pub use runner::{JobRun, RunOutcome, Scheduler, SchedulerHandle};
