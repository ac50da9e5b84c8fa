//! Job descriptors persisted in the job store.
//!
//! Defines the [`Job`] type: a named unit of recurring work with a cron
//! schedule, a handler key, and an opaque payload. The scheduler is the sole
//! writer of `last_run`; everything else is owned by whoever schedules or
//! deletes the job.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::scheduler::cron::CronSchedule;

/// A persisted, named, schedule-triggered unit of recurring work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier (e.g. `"job-daily-digest"`).
    pub id: String,
    /// Human-readable job name.
    pub name: String,
    /// Five-field cron expression controlling when the job fires.
    pub schedule: CronSchedule,
    /// Handler key resolved through the handler registry.
    pub handler: String,
    /// Opaque payload passed to the handler, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Whether the job is eligible to run.
    pub enabled: bool,
    /// Epoch milliseconds of the last dispatch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<i64>,
}

impl Job {
    /// Create a new enabled job with no payload.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        schedule: CronSchedule,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            schedule,
            handler: handler.into(),
            data: None,
            enabled: true,
            last_run: None,
        }
    }

    /// Attach an opaque payload for the handler.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Mint a fresh job id.
    #[must_use]
    pub fn generate_id() -> String {
        format!("job-{}", Uuid::new_v4())
    }

    /// Returns `true` when the job should fire at `at`.
    ///
    /// Requires the job to be enabled, its schedule to match `at`, and at
    /// least one full polling period to have elapsed since `last_run`. The
    /// elapsed check is the sole re-fire guard: it keeps a matching schedule
    /// from dispatching on every tick within the same wall-clock minute.
    pub fn is_due_at<Tz: TimeZone>(&self, at: &DateTime<Tz>, period: Duration) -> bool {
        if !self.enabled {
            return false;
        }
        if !self.schedule.matches_at(at) {
            return false;
        }
        match self.last_run {
            None => true,
            Some(last_ms) => {
                let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
                at.timestamp_millis().saturating_sub(last_ms) >= period_ms
            }
        }
    }

    /// Record a dispatch at `at_ms` (epoch milliseconds).
    ///
    /// `last_run` never moves backwards, even if the caller passes an older
    /// timestamp.
    pub fn mark_run(&mut self, at_ms: i64) {
        self.last_run = Some(self.last_run.map_or(at_ms, |prev| prev.max(at_ms)));
    }
}
