//! Orchestration daemon.
//!
//! Composition root for the scheduler: loads config, opens the job store,
//! registers the handler set, seeds the preset jobs, and runs the polling
//! loop until ctrl-c. Handlers that need a language model go through the
//! orchestrator's provider fallback.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use baton::config::BatonConfig;
use baton::providers::{HttpCompletionClient, ProviderTable};
use baton::relay::{
    ExecutionContext, PatternLibrary, RelayEngine, TriggerTable, WorkflowCatalog,
};
use baton::runtime::Orchestrator;
use baton::scheduler::{HandlerRegistry, Job, JobHandler, Scheduler};
use baton::store::JobStore;

/// No-op job proving the scheduler is alive.
struct HeartbeatHandler;

#[async_trait]
impl JobHandler for HeartbeatHandler {
    async fn run(&self, _data: Option<&serde_json::Value>) -> baton::Result<String> {
        Ok("heartbeat".to_owned())
    }
}

/// Runs a relay workflow named in the job payload.
struct WorkflowHandler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl JobHandler for WorkflowHandler {
    async fn run(&self, data: Option<&serde_json::Value>) -> baton::Result<String> {
        let workflow = data
            .and_then(|d| d.get("workflow"))
            .and_then(|w| w.as_str())
            .unwrap_or("daily_digest");

        let mut context = ExecutionContext::new();
        if let Some(seed) = data.and_then(|d| d.get("context")).and_then(|c| c.as_object()) {
            for (key, value) in seed {
                if let Some(text) = value.as_str() {
                    context = context.with(key.clone(), text);
                }
            }
        }

        let reply = self
            .orchestrator
            .run_workflow(workflow, context, None)
            .await?;
        Ok(reply.reply)
    }
}

fn preset_jobs() -> baton::Result<Vec<Job>> {
    Ok(vec![
        Job::new(
            "daily-digest",
            "Daily Digest",
            "0 9 * * *".parse()?,
            "run_workflow",
        )
        .with_data(serde_json::json!({
            "workflow": "daily_digest",
            "context": { "audience": "operators" },
        })),
        Job::new(
            "weekly-review",
            "Weekly Content Review",
            "0 10 * * 1".parse()?,
            "run_workflow",
        )
        .with_data(serde_json::json!({ "workflow": "content_review" })),
        Job::new(
            "hourly-heartbeat",
            "Hourly Heartbeat",
            "0 * * * *".parse()?,
            "heartbeat",
        ),
    ])
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("batond starting");

    let config = BatonConfig::load()?;
    let store = JobStore::open(config.scheduler.store_path());

    let catalog = WorkflowCatalog::builtin().load_dir(&config.relay.workflow_dir());
    let providers = ProviderTable::builtin();
    let client = Arc::new(HttpCompletionClient::new(&config.provider)?);
    tracing::info!(
        endpoint = client.api_url(),
        models = ?providers.models(),
        "completion stack ready"
    );

    let orchestrator = Arc::new(Orchestrator::with_parts(
        RelayEngine::new(catalog, PatternLibrary::builtin()),
        TriggerTable::builtin(),
        providers,
        client,
        &config.provider,
    ));
    tracing::info!(
        workflows = ?orchestrator.engine().catalog().names(),
        "workflow catalog ready"
    );

    let mut registry = HandlerRegistry::new();
    registry.register("heartbeat", Arc::new(HeartbeatHandler));
    registry.register(
        "run_workflow",
        Arc::new(WorkflowHandler {
            orchestrator: Arc::clone(&orchestrator),
        }),
    );

    let scheduler = Scheduler::new(store, registry)
        .with_period(Duration::from_secs(config.scheduler.poll_interval_secs));

    // Presets seed the store on first start only; a restart keeps each
    // stored job's last_run.
    let existing = scheduler.jobs()?;
    for job in preset_jobs()? {
        if existing.iter().any(|stored| stored.id == job.id) {
            continue;
        }
        scheduler.schedule_job(job)?;
    }

    let handle = scheduler.run();
    tracing::info!("scheduler running; ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    handle.stop();
    handle.join().await;

    tracing::info!("batond shut down cleanly");
    Ok(())
}
