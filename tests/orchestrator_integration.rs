//! Integration tests for the composed orchestration pipeline.
//!
//! Tests the full path: scheduler over a durable store dispatching job
//! handlers, handlers running relay workflows through the orchestrator, and
//! prompt completions flowing through the real HTTP client against a mock
//! completions endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use baton::config::ProviderConfig;
use baton::error::BatonError;
use baton::providers::HttpCompletionClient;
use baton::relay::ExecutionContext;
use baton::runtime::Orchestrator;
use baton::scheduler::{HandlerRegistry, Job, JobHandler, RunOutcome, Scheduler};
use baton::store::JobStore;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use tokio::sync::mpsc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ENDPOINT_PATH: &str = "/api/v1/chat/completions";

fn endpoint_config(mock_server: &MockServer) -> ProviderConfig {
    ProviderConfig {
        api_url: format!("{}{ENDPOINT_PATH}", mock_server.uri()),
        request_timeout_secs: 5,
        connect_timeout_secs: 5,
        ..ProviderConfig::default()
    }
}

fn orchestrator_for(mock_server: &MockServer) -> Arc<Orchestrator> {
    let config = endpoint_config(mock_server);
    let client = Arc::new(HttpCompletionClient::new(&config).expect("client builds"));
    Arc::new(Orchestrator::new(client, &config))
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "choices": [{
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }]
    })
}

fn nine_am() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0)
        .single()
        .expect("valid time")
}

/// Runs the stock daily digest workflow with the job payload's audience.
struct DigestHandler {
    orchestrator: Arc<Orchestrator>,
}

#[async_trait]
impl JobHandler for DigestHandler {
    async fn run(&self, data: Option<&serde_json::Value>) -> baton::Result<String> {
        let mut context = ExecutionContext::new();
        if let Some(audience) = data.and_then(|d| d.get("audience")).and_then(|v| v.as_str()) {
            context = context.with("audience", audience);
        }
        let reply = self
            .orchestrator
            .run_workflow("daily_digest", context, None)
            .await?;
        Ok(reply.reply)
    }
}

/// Test a plain chat message: no trigger, one completion call, no workflow.
#[tokio::test]
async fn test_chat_message_round_trips_through_endpoint() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "messages": [{"role": "system"}, {"role": "user", "content": "good morning"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("morning!")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let reply = orchestrator
        .handle_message("good morning", None)
        .await
        .expect("reply");

    assert_eq!(reply.reply, "morning!");
    assert_eq!(reply.model, "x-ai/grok-4.1-fast");
    assert_eq!(reply.attempted_models, vec!["x-ai/grok-4.1-fast"]);
    assert!(!reply.fallback_used);
    assert!(reply.workflow.is_none());
}

/// Test a trigger phrase: the workflow runs, and its prompt step is
/// completed over HTTP under the pattern's role.
#[tokio::test]
async fn test_trigger_runs_workflow_with_role_framed_completion() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({
            "messages": [{"role": "system", "content": "You are acting as: analyst."}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("Digest ready.")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let reply = orchestrator
        .handle_message("Could you run the daily digest?", None)
        .await
        .expect("reply");

    assert_eq!(reply.workflow.as_deref(), Some("daily_digest"));
    let outcome = reply.outcome.expect("outcome");
    assert!(outcome.success);
    assert_eq!(outcome.steps_completed, 3);
    assert_eq!(reply.attempted_models, vec!["x-ai/grok-4.1-fast"]);
    assert!(reply.reply.contains("daily_digest"));
    assert!(reply.reply.contains("Digest ready."));
}

/// Test provider rotation: the first-rank model is rate limited, the
/// second-rank model answers.
#[tokio::test]
async fn test_rate_limited_model_rotates_to_next_rank() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({"model": "x-ai/grok-4.1-fast"})))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "60"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .and(body_partial_json(json!({"model": "qwen/qwen-2.5-coder-7b-instruct"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("still here")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let reply = orchestrator
        .handle_message("good evening", None)
        .await
        .expect("reply");

    assert_eq!(reply.reply, "still here");
    assert_eq!(reply.model, "qwen/qwen-2.5-coder-7b-instruct");
    assert!(reply.fallback_used);
    assert_eq!(
        reply.attempted_models,
        vec!["x-ai/grok-4.1-fast", "qwen/qwen-2.5-coder-7b-instruct"]
    );
}

/// Test attempt exhaustion: every model is rate limited and the error
/// carries the ordered list of models actually tried.
#[tokio::test]
async fn test_all_providers_rate_limited_surfaces_attempt_list() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator_for(&mock_server);
    let err = orchestrator
        .handle_message("hello there", None)
        .await
        .expect_err("should exhaust");

    match err {
        BatonError::ProvidersExhausted {
            attempted,
            last_error,
        } => {
            assert_eq!(
                attempted,
                vec![
                    "x-ai/grok-4.1-fast",
                    "qwen/qwen-2.5-coder-7b-instruct",
                    "google/gemini-pro-1.5",
                ]
            );
            assert!(
                last_error.contains("rate limited"),
                "unexpected last error: {last_error}"
            );
        }
        other => panic!("Expected ProvidersExhausted, got {other:?}"),
    }
}

/// Test a scheduled job end to end: the store-backed scheduler dispatches
/// the digest handler, whose workflow completion goes out over HTTP, and
/// the job's last_run advances so the next pass is suppressed.
#[tokio::test]
async fn test_scheduled_job_completes_workflow_end_to_end() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "Tuesday's digest: all services nominal.",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = JobStore::open(dir.path().join("jobs.json"));
    let orchestrator = orchestrator_for(&mock_server);

    let mut registry = HandlerRegistry::new();
    registry.register(
        "run_daily_digest",
        Arc::new(DigestHandler {
            orchestrator: Arc::clone(&orchestrator),
        }),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(store, registry).with_run_channel(tx);
    scheduler
        .schedule_job(
            Job::new(
                "daily-digest",
                "Daily Digest",
                "0 9 * * *".parse().expect("schedule"),
                "run_daily_digest",
            )
            .with_data(json!({"audience": "operators"})),
        )
        .expect("schedule");

    let at = nine_am();
    assert_eq!(scheduler.run_pass_at(&at).await, 1);

    let run = rx.try_recv().expect("run report");
    assert_eq!(run.job_id, "daily-digest");
    assert_eq!(run.outcome, RunOutcome::Success);
    assert!(run.summary.contains("daily_digest"));
    assert!(run.summary.contains("Tuesday's digest"));

    let jobs = scheduler.jobs().expect("list");
    assert_eq!(jobs[0].last_run, Some(at.timestamp_millis()));

    // Same instant again: suppressed, no second completion call.
    assert_eq!(scheduler.run_pass_at(&at).await, 0);
}

/// Test that a failing handler never poisons the pass: the endpoint rate
/// limits everything, the run is reported as an error, and last_run still
/// advances.
#[tokio::test]
async fn test_scheduled_job_failure_is_contained() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(ENDPOINT_PATH))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = JobStore::open(dir.path().join("jobs.json"));
    let orchestrator = orchestrator_for(&mock_server);

    let mut registry = HandlerRegistry::new();
    registry.register(
        "run_daily_digest",
        Arc::new(DigestHandler {
            orchestrator: Arc::clone(&orchestrator),
        }),
    );

    let (tx, mut rx) = mpsc::unbounded_channel();
    let scheduler = Scheduler::new(store, registry).with_run_channel(tx);
    let job_id = Job::generate_id();
    scheduler
        .schedule_job(Job::new(
            &job_id,
            "Daily Digest",
            "0 9 * * *".parse().expect("schedule"),
            "run_daily_digest",
        ))
        .expect("schedule");

    let at = nine_am();
    assert_eq!(scheduler.run_pass_at(&at).await, 1);

    let run = rx.try_recv().expect("run report");
    assert_eq!(run.job_id, job_id);
    assert_eq!(run.outcome, RunOutcome::Error);
    assert!(
        run.summary.contains("providers exhausted"),
        "unexpected summary: {}",
        run.summary
    );

    // The dispatch still counts against the suppression window.
    let jobs = scheduler.jobs().expect("list");
    assert_eq!(jobs[0].last_run, Some(at.timestamp_millis()));
    assert_eq!(scheduler.run_pass_at(&at).await, 0);
}
