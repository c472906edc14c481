//! End-to-end runs of the agent loop against scripted providers and an
//! in-memory workspace.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use stepwise_agent::{AgentLoop, CANCELLED_BEFORE_EXECUTION, RunEvent};
use stepwise_core::artifact::{Artifact, ArtifactKind};
use stepwise_core::error::{Error, ProviderError, ToolError};
use stepwise_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use stepwise_core::run::{RunConfig, RunState};
use stepwise_core::tool::{ArgType, Tool, ToolArgs, ToolCatalog, ToolSpec};
use stepwise_core::turn::{ToolCallRequest, ToolStatus, Turn};
use stepwise_core::workspace::{FileStore, Workspace};
use stepwise_security::CommandPolicy;
use stepwise_tools::{MemoryWorkspace, default_catalog};
use tokio::sync::Notify;
use tokio_stream::StreamExt;

// --- Test providers ---

/// Replays scripted outcomes in order and records every request it receives.
struct ScriptedProvider {
    outcomes: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(outcomes: Vec<Result<ProviderResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.outcomes.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(ProviderError::ApiError {
                status_code: 400,
                message: "script exhausted".into(),
            })
        })
    }
}

/// Never answers.
struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn send(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

fn text(t: &str) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        text: Some(t.into()),
        tool_calls: vec![],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "test-model".into(),
    })
}

fn calls(requests: Vec<ToolCallRequest>) -> Result<ProviderResponse, ProviderError> {
    Ok(ProviderResponse {
        text: None,
        tool_calls: requests,
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        model: "test-model".into(),
    })
}

fn call(id: &str, name: &str, args: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, args)
}

fn catalog() -> Arc<ToolCatalog> {
    Arc::new(default_catalog(CommandPolicy::allow_all()))
}

fn config() -> RunConfig {
    RunConfig {
        retry_base_delay: Duration::from_millis(1),
        provider_timeout: Duration::from_secs(5),
        ..RunConfig::default()
    }
    .with_model("test-model")
}

// --- Test tools ---

/// Counts executions; requires a `path` argument.
struct CountingTool {
    spec: ToolSpec,
    executions: AtomicUsize,
}

impl CountingTool {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            spec: ToolSpec::new("touch", "Count a touch").required("path", ArgType::String, "path"),
            executions: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Tool for CountingTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _args: &ToolArgs, _ws: &Workspace) -> Result<serde_json::Value, ToolError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        Ok(json!({"touched": true}))
    }
}

/// Signals when it starts, then blocks until released.
struct GatedTool {
    spec: ToolSpec,
    started: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl Tool for GatedTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _args: &ToolArgs, ws: &Workspace) -> Result<serde_json::Value, ToolError> {
        self.started.notify_one();
        self.release.notified().await;
        ws.files.write("slow.txt", b"done").await?;
        Ok(json!({"finished": true}))
    }
}

// --- Scenarios ---

#[tokio::test]
async fn scenario_a_create_file() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "write_file", json!({"path": "a.txt", "content": "hi"}))]),
        text("Created a.txt."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent
        .start("create file a.txt with content hi", catalog(), config())
        .unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert!(outcome.is_success());
    assert_eq!(outcome.final_text.as_deref(), Some("Created a.txt."));
    assert_eq!(outcome.iterations, 1);
    assert_eq!(
        outcome.artifacts,
        vec![Artifact {
            target: "a.txt".into(),
            kind: ArtifactKind::Created,
            first_seen_iteration: 0,
        }]
    );
    assert_eq!(outcome.usage.total_tokens, 30);
    assert_eq!(ws.files.get_string("a.txt").as_deref(), Some("hi"));
    assert_eq!(handle.state(), RunState::Completed);

    // The model saw the system prompt and the full catalog.
    let first = provider.request(0);
    assert!(first.system.as_deref().unwrap().contains("write_file"));
    assert_eq!(first.tools.len(), 9);
    assert_eq!(first.model, "test-model");
}

#[tokio::test]
async fn scenario_a_event_stream() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "write_file", json!({"path": "a.txt", "content": "hi"}))]),
        text("Done."),
    ]);
    let agent = AgentLoop::new(provider, ws.workspace());

    let mut handle = agent.start("create a.txt", catalog(), config()).unwrap();
    let events = handle.events().unwrap();
    assert!(handle.events().is_none());
    handle.wait().await.unwrap();

    let events: Vec<RunEvent> = events.collect().await;
    let types: Vec<&str> = events.iter().map(RunEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            "model_call_started",
            "tool_call_started",
            "tool_call_finished",
            "model_call_started",
            "run_completed",
        ]
    );
    match &events[2] {
        RunEvent::ToolCallFinished { name, result, .. } => {
            assert_eq!(name, "write_file");
            assert!(result.is_ok());
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(events[3], RunEvent::ModelCallStarted { iteration: 1 });
}

#[tokio::test]
async fn scenario_b_recovers_from_tool_error() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "read_file", json!({"path": "missing.txt"}))]),
        calls(vec![call("c2", "write_file", json!({"path": "missing.txt", "content": "x"}))]),
        text("Created missing.txt since it did not exist."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("make sure missing.txt exists", catalog(), config()).unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.iterations, 2);
    assert_eq!(outcome.artifacts.len(), 1);
    assert_eq!(outcome.artifacts[0].target, "missing.txt");
    assert_eq!(outcome.artifacts[0].kind, ArtifactKind::Created);
    assert_eq!(outcome.artifacts[0].first_seen_iteration, 1);

    // The error result reached the model on the second call.
    let second = provider.request(1);
    match second.turns.last().unwrap() {
        Turn::ToolResults { results } => {
            assert_eq!(results[0].call_id, "c1");
            assert_eq!(results[0].status, ToolStatus::Error);
            assert!(results[0].content().contains("not found"));
        }
        other => panic!("expected tool results, got {other:?}"),
    }

    // Every tool-requesting turn is answered by exactly one result turn with matching ids.
    let turns = handle.conversation().unwrap().turns();
    let requesting = turns.iter().filter(|t| t.requests_tools()).count();
    let answered = turns
        .iter()
        .filter(|t| matches!(t, Turn::ToolResults { .. }))
        .count();
    assert_eq!(requesting, 2);
    assert_eq!(answered, 2);
    for pair in turns.windows(2) {
        if let (Turn::Assistant { tool_calls, .. }, next) = (&pair[0], &pair[1])
            && !tool_calls.is_empty()
        {
            let Turn::ToolResults { results } = next else {
                panic!("request turn not followed by results");
            };
            let requested: Vec<&str> = tool_calls.iter().map(|c| c.id.as_str()).collect();
            let returned: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
            assert_eq!(requested, returned);
        }
    }
}

#[tokio::test]
async fn scenario_c_iteration_limit() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "git_status", json!({}))]),
        calls(vec![call("c2", "git_status", json!({}))]),
        calls(vec![call("c3", "git_status", json!({}))]),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent
        .start("keep checking", catalog(), config().with_max_iterations(2))
        .unwrap();
    let events = handle.events().unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::IterationLimitReached);
    assert_eq!(outcome.iterations, 2);
    assert!(outcome.final_text.is_none());
    assert_eq!(provider.call_count(), 2);

    let events: Vec<RunEvent> = events.collect().await;
    assert!(!events.iter().any(|e| matches!(e, RunEvent::RunCompleted { .. })));
    assert!(matches!(
        events.last(),
        Some(RunEvent::IterationLimitReached { iterations: 2, .. })
    ));
}

#[tokio::test]
async fn scenario_d_transient_errors_retried() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::Network("connection reset".into())),
        Err(ProviderError::ApiError {
            status_code: 503,
            message: "overloaded".into(),
        }),
        text("All good."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("say hi", catalog(), config()).unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(outcome.final_text.as_deref(), Some("All good."));
    assert!(outcome.failure.is_none());
    assert_eq!(provider.call_count(), 3);
}

// --- Failure modes ---

#[tokio::test]
async fn retries_exhausted_fail_the_run() {
    let ws = MemoryWorkspace::new();
    ws.files.insert("notes.md", "draft");
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "write_file", json!({"path": "notes.md", "content": "final"}))]),
        Err(ProviderError::Timeout("slow".into())),
        Err(ProviderError::Timeout("slow".into())),
        Err(ProviderError::Timeout("slow".into())),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("finalize notes", catalog(), config()).unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.failure.as_deref().unwrap().contains("timed out"));
    assert_eq!(provider.call_count(), 4);
    // Partial progress is still reported.
    assert_eq!(outcome.artifacts[0].target, "notes.md");
    assert_eq!(outcome.artifacts[0].kind, ArtifactKind::Modified);
}

#[tokio::test]
async fn fatal_provider_error_fails_immediately() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::AuthenticationFailed("invalid key".into())),
        text("unreachable"),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("anything", catalog(), config()).unwrap();
    let events = handle.events().unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.failure.as_deref().unwrap().contains("Authentication failed"));
    assert_eq!(provider.call_count(), 1);

    let events: Vec<RunEvent> = events.collect().await;
    assert!(matches!(events.last(), Some(RunEvent::RunFailed { .. })));
}

#[tokio::test]
async fn validation_precedes_execution() {
    let ws = MemoryWorkspace::new();
    let tool = CountingTool::new();
    let mut custom = ToolCatalog::new();
    custom.register(tool.clone());

    let provider = ScriptedProvider::new(vec![
        calls(vec![
            call("c1", "touch", json!({})),
            call("c2", "touch", json!({"path": 7})),
            call("c3", "rm_rf", json!({"path": "/"})),
            call("c4", "touch", json!({"path": "ok.txt"})),
        ]),
        text("Done."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("touch things", Arc::new(custom), config()).unwrap();
    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.state, RunState::Completed);

    // Only the valid call reached the tool.
    assert_eq!(tool.executions.load(Ordering::SeqCst), 1);

    let Turn::ToolResults { results } = provider.request(1).turns.last().cloned().unwrap() else {
        panic!("expected tool results");
    };
    assert_eq!(results.len(), 4);
    assert_eq!(
        results[0].content(),
        "Error: Invalid argument 'path': required field is missing"
    );
    assert!(results[1].content().contains("expected string"));
    assert_eq!(results[2].content(), "Error: Unknown tool: rm_rf");
    assert!(results[3].is_ok());
}

#[tokio::test]
async fn duplicate_call_ids_are_a_protocol_violation() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![calls(vec![
        call("dup", "git_status", json!({})),
        call("dup", "git_status", json!({})),
    ])]);
    let agent = AgentLoop::new(provider, ws.workspace());

    let mut handle = agent.start("status twice", catalog(), config()).unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.failure.as_deref().unwrap().contains("Protocol violation"));
}

#[tokio::test]
async fn full_conversation_fails_the_run() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![calls(vec![call("c1", "git_status", json!({}))])]);
    let agent = AgentLoop::new(provider, ws.workspace());

    let cfg = RunConfig {
        max_conversation_turns: 2,
        ..config()
    };
    let mut handle = agent.start("check", catalog(), cfg).unwrap();
    let outcome = handle.wait().await.unwrap();

    assert_eq!(outcome.state, RunState::Failed);
    assert!(outcome.failure.as_deref().unwrap().contains("compact"));
}

// --- Cancellation ---

#[tokio::test]
async fn cancel_during_tools_finishes_in_flight_call() {
    let ws = MemoryWorkspace::new();
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());

    let mut custom = default_catalog(CommandPolicy::allow_all());
    custom.register(Arc::new(GatedTool {
        spec: ToolSpec::new("slow_write", "Write slowly"),
        started: started.clone(),
        release: release.clone(),
    }));

    let provider = ScriptedProvider::new(vec![
        calls(vec![
            call("c1", "slow_write", json!({})),
            call("c2", "write_file", json!({"path": "never.txt", "content": "x"})),
        ]),
        text("unreachable"),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut handle = agent.start("write slowly", Arc::new(custom), config()).unwrap();
    started.notified().await;
    assert_eq!(handle.state(), RunState::ExecutingTools);
    agent.cancel(&handle).unwrap();
    release.notify_one();

    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(provider.call_count(), 1);

    // The in-flight call finished; the next one was never dispatched.
    assert_eq!(ws.files.get_string("slow.txt").as_deref(), Some("done"));
    assert!(ws.files.get("never.txt").is_none());

    let Turn::ToolResults { results } = handle.conversation().unwrap().turns().last().unwrap() else {
        panic!("expected the result turn to be appended");
    };
    assert!(results[0].is_ok());
    assert_eq!(results[1].call_id, "c2");
    assert_eq!(results[1].content(), format!("Error: {CANCELLED_BEFORE_EXECUTION}"));

    // A finished run cannot be cancelled again.
    assert!(matches!(agent.cancel(&handle), Err(Error::RunNotActive(_))));
}

#[tokio::test]
async fn cancel_during_model_call() {
    let ws = MemoryWorkspace::new();
    let agent = AgentLoop::new(Arc::new(HangingProvider), ws.workspace());

    let mut handle = agent.start("wait forever", catalog(), config()).unwrap();
    let events = handle.events().unwrap();
    handle
        .watch_state()
        .wait_for(|s| *s == RunState::AwaitingModel)
        .await
        .unwrap();

    handle.cancel().unwrap();
    let outcome = handle.wait().await.unwrap();
    assert_eq!(outcome.state, RunState::Cancelled);
    assert_eq!(outcome.iterations, 0);

    let events: Vec<RunEvent> = events.collect().await;
    assert!(matches!(events.last(), Some(RunEvent::RunCancelled { .. })));
}

#[tokio::test]
async fn concurrent_start_is_rejected() {
    let ws = MemoryWorkspace::new();
    let agent = AgentLoop::new(Arc::new(HangingProvider), ws.workspace());

    let mut first = agent.start("one", catalog(), config()).unwrap();
    assert!(agent.is_busy());
    assert!(matches!(
        agent.start("two", catalog(), config()),
        Err(Error::RunInProgress)
    ));

    first.cancel().unwrap();
    first.wait().await.unwrap();
    assert!(!agent.is_busy());

    let mut second = agent.start("three", catalog(), config()).unwrap();
    second.cancel().unwrap();
    assert_eq!(second.wait().await.unwrap().state, RunState::Cancelled);
}

// --- Compaction and follow-up ---

#[tokio::test]
async fn compaction_then_follow_up() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "write_file", json!({"path": "a.txt", "content": "hi"}))]),
        text("Wrote a.txt."),
        text("The user asked for a.txt; it was created with content hi."),
        text("Second task done."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let mut first = agent.start("create a.txt", catalog(), config()).unwrap();
    first.wait().await.unwrap();
    assert_eq!(first.conversation().unwrap().len(), 4);

    let folded = agent.compact(&mut first).await.unwrap();
    assert_eq!(folded, 3);
    let turns = first.conversation().unwrap().turns();
    assert_eq!(
        turns,
        &[
            Turn::summary("The user asked for a.txt; it was created with content hi."),
            Turn::user("create a.txt"),
        ]
    );

    // Compaction is a tool-less round-trip carrying the serialized history.
    let compaction = provider.request(2);
    assert!(compaction.tools.is_empty());
    assert!(compaction.system.is_none());
    let prompt = compaction.turns[0].text().unwrap();
    assert!(prompt.starts_with("You are a context compaction assistant."));
    assert!(prompt.contains("[tool_call: write_file("));

    let mut second = agent.follow_up(&mut first, "now summarize").await.unwrap();
    let outcome = second.wait().await.unwrap();
    assert_eq!(outcome.final_text.as_deref(), Some("Second task done."));
    assert!(outcome.artifacts.is_empty());

    let seen = provider.request(3).turns;
    assert!(matches!(seen[0], Turn::Summary { .. }));
    assert_eq!(seen.last(), Some(&Turn::user("now summarize")));
}

#[tokio::test]
async fn compacting_an_active_run_is_rejected() {
    let ws = MemoryWorkspace::new();
    let agent = AgentLoop::new(Arc::new(HangingProvider), ws.workspace());

    let mut handle = agent.start("busy", catalog(), config()).unwrap();
    assert!(matches!(
        agent.compact(&mut handle).await,
        Err(Error::RunActive(_))
    ));
    assert!(matches!(
        agent.follow_up(&mut handle, "more").await,
        Err(Error::RunActive(_))
    ));

    handle.cancel().unwrap();
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn rewrites_under_another_spelling_stay_created() {
    let ws = MemoryWorkspace::new();
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "write_file", json!({"path": "a.txt", "content": "hi"}))]),
        calls(vec![call("c2", "write_file", json!({"path": "./a.txt", "content": "hello"}))]),
        text("Done."),
    ]);
    let agent = AgentLoop::new(provider, ws.workspace());

    let outcome = agent
        .start("write a.txt twice", catalog(), config())
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(
        outcome.artifacts,
        vec![Artifact {
            target: "a.txt".into(),
            kind: ArtifactKind::Created,
            first_seen_iteration: 0,
        }]
    );
    assert_eq!(ws.files.get_string("a.txt").as_deref(), Some("hello"));
}

#[tokio::test]
async fn failing_command_is_not_an_artifact() {
    let ws = MemoryWorkspace::new();
    ws.sandbox.push_output("", "error[E0425]: cannot find value", 101);
    ws.sandbox.push_output("ok", "", 0);
    let provider = ScriptedProvider::new(vec![
        calls(vec![call("c1", "run_command", json!({"command": "cargo build"}))]),
        calls(vec![call("c2", "run_command", json!({"command": "cargo fmt"}))]),
        text("Formatted."),
    ]);
    let agent = AgentLoop::new(provider.clone(), ws.workspace());

    let outcome = agent
        .start("build and format", catalog(), config())
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(outcome.state, RunState::Completed);
    assert_eq!(ws.sandbox.commands(), vec!["cargo build", "cargo fmt"]);
    assert_eq!(
        outcome.artifacts,
        vec![Artifact {
            target: "cargo fmt".into(),
            kind: ArtifactKind::Executed,
            first_seen_iteration: 1,
        }]
    );

    // The model still saw the failure.
    let second = provider.request(1);
    let Some(Turn::ToolResults { results }) = second.turns.last() else {
        panic!("expected tool results last, got {:?}", second.turns.last());
    };
    assert_eq!(results[0].status, ToolStatus::Error);
    assert!(results[0].content().contains("exit code 101"));
}
