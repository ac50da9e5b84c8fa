//! Scheduler background loop.
//!
//! Polls the job store on a fixed period, evaluates each job's cron
//! expression against wall-clock time, and dispatches due jobs to their
//! registered handlers. One evaluation pass runs at a time; passes never
//! overlap because the loop awaits each pass before taking the next tick.

use chrono::{DateTime, Local, TimeZone, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{BatonError, Result};
use crate::scheduler::job::Job;
use crate::scheduler::registry::HandlerRegistry;
use crate::store::JobStore;

/// Default interval between evaluation passes (seconds).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// How one job dispatch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Handler completed.
    Success,
    /// Handler failed (or no handler was registered for the stored name).
    Error,
}

/// Report emitted after each dispatch.
#[derive(Debug, Clone)]
pub struct JobRun {
    /// Id of the job that ran.
    pub job_id: String,
    /// Epoch milliseconds of the dispatch.
    pub at_ms: i64,
    /// How the dispatch ended.
    pub outcome: RunOutcome,
    /// Handler summary or error text.
    pub summary: String,
}

/// Polls the job store and dispatches due jobs.
///
/// Built by the composition root and consumed by [`run`](Self::run); there is
/// no global instance. All job state lives in the store, so a clone shares
/// the same jobs.
#[derive(Clone)]
pub struct Scheduler {
    /// Durable job records.
    store: JobStore,
    /// Named handlers, fixed at startup.
    registry: HandlerRegistry,
    /// Polling period; also the re-fire suppression window.
    period: Duration,
    /// Channel for dispatch reports.
    run_tx: Option<mpsc::UnboundedSender<JobRun>>,
}

impl Scheduler {
    /// Create a scheduler over the given store and handler registry.
    #[must_use]
    pub fn new(store: JobStore, registry: HandlerRegistry) -> Self {
        Self {
            store,
            registry,
            period: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            run_tx: None,
        }
    }

    /// Override the polling period (clamped to at least 1 ms).
    #[must_use]
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period.max(Duration::from_millis(1));
        self
    }

    /// Send a [`JobRun`] report after every dispatch.
    #[must_use]
    pub fn with_run_channel(mut self, tx: mpsc::UnboundedSender<JobRun>) -> Self {
        self.run_tx = Some(tx);
        self
    }

    /// Polling period in effect.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Upsert a job by id.
    ///
    /// The schedule expression was already validated when the
    /// [`CronSchedule`](crate::scheduler::CronSchedule) was parsed; this is
    /// where the handler name is checked, so a job with an unregistered
    /// handler is refused before it ever reaches the store.
    pub fn schedule_job(&self, job: Job) -> Result<()> {
        if !self.registry.contains(&job.handler) {
            return Err(BatonError::UnknownHandler(job.handler));
        }
        self.store.put(&job)?;
        info!(
            job_id = job.id.as_str(),
            schedule = %job.schedule,
            handler = job.handler.as_str(),
            "job scheduled"
        );
        Ok(())
    }

    /// Enable or disable a job by id. Returns `true` when found.
    pub fn set_job_enabled(&self, job_id: &str, enabled: bool) -> Result<bool> {
        let Some(mut job) = self.store.get(job_id)? else {
            return Ok(false);
        };
        job.enabled = enabled;
        self.store.put(&job)?;
        Ok(true)
    }

    /// Delete a job by id. Deleting a missing id is a no-op.
    pub fn remove_job(&self, job_id: &str) -> Result<()> {
        self.store.delete(job_id)
    }

    /// All stored jobs, in unspecified order.
    pub fn jobs(&self) -> Result<Vec<Job>> {
        self.store.list_all()
    }

    /// Run one evaluation pass at the current local time.
    ///
    /// Returns the number of jobs dispatched.
    pub async fn run_pass(&self) -> usize {
        self.run_pass_at(&Local::now()).await
    }

    /// Run one evaluation pass as of the given instant.
    ///
    /// Every enabled job whose schedule matches `at` and whose `last_run` is
    /// unset or at least one full period old is dispatched, then its
    /// `last_run` is persisted. Handler errors are caught and logged per job
    /// and never abort the pass; a store failure skips the whole pass.
    pub async fn run_pass_at<Tz: TimeZone>(&self, at: &DateTime<Tz>) -> usize {
        let jobs = match self.store.list_all() {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("skipping scheduler pass, job store unavailable: {e}");
                return 0;
            }
        };

        let mut dispatched = 0;
        for job in jobs {
            if !job.is_due_at(at, self.period) {
                continue;
            }
            self.dispatch(job, at.timestamp_millis()).await;
            dispatched += 1;
        }

        if dispatched > 0 {
            debug!(count = dispatched, "scheduler pass dispatched jobs");
        }
        dispatched
    }

    /// Dispatch one job by id right now, ignoring its schedule.
    ///
    /// Returns `Ok(None)` when the id is not stored. `last_run` advances
    /// exactly as for a scheduled dispatch.
    pub async fn trigger_job(&self, job_id: &str) -> Result<Option<JobRun>> {
        let Some(job) = self.store.get(job_id)? else {
            return Ok(None);
        };
        Ok(Some(self.dispatch(job, Utc::now().timestamp_millis()).await))
    }

    /// Invoke a job's handler and persist the advanced `last_run`.
    ///
    /// `last_run` advances even when the handler fails: the guarantee is
    /// at-most-once per period, not run-until-success.
    async fn dispatch(&self, mut job: Job, at_ms: i64) -> JobRun {
        debug!(
            job_id = job.id.as_str(),
            handler = job.handler.as_str(),
            "dispatching job"
        );

        let (outcome, summary) = match self.registry.get(&job.handler) {
            Some(handler) => match handler.run(job.data.as_ref()).await {
                Ok(summary) => {
                    info!(job_id = job.id.as_str(), "job completed: {summary}");
                    (RunOutcome::Success, summary)
                }
                Err(e) => {
                    warn!(job_id = job.id.as_str(), "job failed: {e}");
                    (RunOutcome::Error, e.to_string())
                }
            },
            // schedule_job refuses unknown handlers, but the store can carry
            // records written before a handler was retired.
            None => {
                warn!(
                    job_id = job.id.as_str(),
                    handler = job.handler.as_str(),
                    "no handler registered for job"
                );
                (
                    RunOutcome::Error,
                    format!("no handler registered: {}", job.handler),
                )
            }
        };

        job.mark_run(at_ms);
        if let Err(e) = self.store.put(&job) {
            error!(job_id = job.id.as_str(), "cannot persist last_run: {e}");
        }

        let run = JobRun {
            job_id: job.id,
            at_ms,
            outcome,
            summary,
        };
        if let Some(tx) = &self.run_tx {
            let _ = tx.send(run.clone());
        }
        run
    }

    /// Start the polling loop.
    ///
    /// Consumes the scheduler and returns a handle whose
    /// [`stop`](SchedulerHandle::stop) prevents any future pass from
    /// starting. An in-flight pass always finishes; cancellation is only
    /// observed at the tick boundary.
    pub fn run(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        let join = tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), "scheduler started");
            let mut interval = tokio::time::interval(self.period);

            loop {
                tokio::select! {
                    () = loop_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        self.run_pass().await;
                    }
                }
            }

            info!("scheduler stopped");
        });

        SchedulerHandle { cancel, join }
    }
}

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop: no pass starts after this call.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to exit. Call [`stop`](Self::stop) first.
    pub async fn join(self) {
        let _ = self.join.await;
    }
}
