//! The agent loop: alternates model calls and tool execution for one run.
//!
//! ```text
//! Idle -> AwaitingModel -> ExecutingTools -> AwaitingModel -> ... -> Completed
//!                 |               |
//!                 +-> Failed      +-> IterationLimitReached / Cancelled
//! ```
//!
//! Tool calls within a turn run sequentially in request order. A failing call
//! becomes an error result for the model to see; it never ends the run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use stepwise_core::artifact::ArtifactTracker;
use stepwise_core::conversation::ConversationStore;
use stepwise_core::error::{Error, ProviderError, Result};
use stepwise_core::provider::{Provider, Usage};
use stepwise_core::run::{RunConfig, RunId, RunOutcome, RunState};
use stepwise_core::tool::{ToolCatalog, ToolExecutor};
use stepwise_core::turn::{ToolCallRequest, ToolCallResult, Turn};
use stepwise_core::workspace::Workspace;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::ProviderAdapter;
use crate::compact;
use crate::event::RunEvent;
use crate::handle::{Finished, RunHandle};
use crate::prompt;

/// Result attached to calls that were never dispatched because of cancellation.
pub const CANCELLED_BEFORE_EXECUTION: &str = "cancelled before execution";

/// Orchestrates runs against one provider and one workspace.
///
/// At most one run is active at a time; a second `start` while one is in
/// flight is rejected with [`Error::RunInProgress`].
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    executor: ToolExecutor,
    active: Arc<AtomicBool>,
}

impl AgentLoop {
    pub fn new(provider: Arc<dyn Provider>, workspace: Workspace) -> Self {
        Self {
            provider,
            executor: ToolExecutor::new(workspace),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Whether a run is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start a run for `instruction` with a fresh conversation.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        instruction: impl Into<String>,
        catalog: Arc<ToolCatalog>,
        config: RunConfig,
    ) -> Result<RunHandle> {
        let conversation = ConversationStore::new(config.max_conversation_turns);
        self.launch(conversation, instruction.into(), catalog, config)
    }

    /// Start a run that continues the (possibly compacted) conversation of a
    /// finished run, with the same catalog and configuration.
    pub async fn follow_up(
        &self,
        previous: &mut RunHandle,
        instruction: impl Into<String>,
    ) -> Result<RunHandle> {
        if !previous.state().is_terminal() {
            return Err(Error::RunActive(previous.id().to_string()));
        }
        previous.wait().await?;
        let conversation = previous
            .conversation()
            .cloned()
            .ok_or_else(|| Error::Internal(format!("run {} has no conversation", previous.id())))?;
        self.launch(
            conversation,
            instruction.into(),
            previous.catalog().clone(),
            previous.config().clone(),
        )
    }

    /// Request cancellation of an active run.
    pub fn cancel(&self, handle: &RunHandle) -> Result<()> {
        handle.cancel()
    }

    /// Collapse a finished run's history into `[Summary, latest user turn]`.
    ///
    /// The summary comes from a provider round-trip with no tools offered.
    /// Returns the number of turns folded into the summary.
    pub async fn compact(&self, handle: &mut RunHandle) -> Result<usize> {
        if !handle.state().is_terminal() {
            return Err(Error::RunActive(handle.id().to_string()));
        }
        handle.wait().await?;

        let run_id = handle.id().clone();
        let adapter = ProviderAdapter::new(self.provider.clone(), handle.config(), None);
        let conversation = handle
            .conversation_mut()
            .ok_or_else(|| Error::Internal(format!("run {run_id} has no conversation")))?;
        if conversation.is_empty() {
            return Ok(0);
        }

        let request = adapter.request(&[compact::summary_request(conversation.turns())], Vec::new());
        let response = adapter.send(request).await?;
        let summary = response
            .text
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("compaction reply carried no summary text".into())
            })?;

        let folded = conversation.compact(summary)?;
        info!(run_id = %run_id, folded, retained = conversation.len(), "Conversation compacted");
        Ok(folded)
    }

    fn launch(
        &self,
        mut conversation: ConversationStore,
        instruction: String,
        catalog: Arc<ToolCatalog>,
        config: RunConfig,
    ) -> Result<RunHandle> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::RunInProgress);
        }
        let guard = ActiveGuard(self.active.clone());

        conversation.append(Turn::user(instruction))?;

        let id = RunId::new();
        let system = prompt::system_prompt(config.system_prompt.as_deref(), &catalog);
        let cancel = CancellationToken::new();
        let (state_tx, state_rx) = watch::channel(RunState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let run = Run {
            id: id.clone(),
            adapter: ProviderAdapter::new(self.provider.clone(), &config, Some(system)),
            executor: self.executor.clone(),
            catalog: catalog.clone(),
            max_iterations: config.max_iterations,
            cancel: cancel.clone(),
            state: state_tx,
            events: events_tx,
            conversation,
            tracker: ArtifactTracker::new(),
            iteration: 0,
            usage: Usage::default(),
            last_text: None,
        };

        let task = tokio::spawn(async move {
            let _guard = guard;
            run.execute().await
        });

        Ok(RunHandle::new(id, cancel, state_rx, events_rx, task, catalog, config))
    }
}

/// Clears the loop's busy flag when the run task ends, however it ends.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum Termination {
    Completed(String),
    Failed(String),
    LimitReached,
    Cancelled,
}

/// State owned by one in-flight run.
struct Run {
    id: RunId,
    adapter: ProviderAdapter,
    executor: ToolExecutor,
    catalog: Arc<ToolCatalog>,
    max_iterations: u32,
    cancel: CancellationToken,
    state: watch::Sender<RunState>,
    events: mpsc::UnboundedSender<RunEvent>,
    conversation: ConversationStore,
    tracker: ArtifactTracker,
    /// Completed tool-execution phases.
    iteration: u32,
    usage: Usage,
    last_text: Option<String>,
}

impl Run {
    async fn execute(mut self) -> Finished {
        info!(
            run_id = %self.id,
            provider = %self.adapter.provider_name(),
            max_iterations = self.max_iterations,
            "Run started"
        );
        let termination = self.drive().await;
        self.finish(termination)
    }

    async fn drive(&mut self) -> Termination {
        let tools = self.catalog.definitions();

        loop {
            if self.cancel.is_cancelled() {
                return Termination::Cancelled;
            }
            if self.iteration >= self.max_iterations {
                warn!(run_id = %self.id, iterations = self.iteration, "Iteration limit reached");
                return Termination::LimitReached;
            }

            self.set_state(RunState::AwaitingModel);
            self.emit(RunEvent::ModelCallStarted {
                iteration: self.iteration,
            });
            debug!(
                run_id = %self.id,
                iteration = self.iteration,
                turns = self.conversation.len(),
                "Requesting next model turn"
            );

            let request = self.adapter.request(self.conversation.turns(), tools.clone());
            let response = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Termination::Cancelled,
                result = self.adapter.send(request) => result,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    return Termination::Failed(format!(
                        "provider '{}' failed: {e}",
                        self.adapter.provider_name()
                    ));
                }
            };

            if let Some(usage) = &response.usage {
                self.usage.add(usage);
            }
            let turn = response.into_turn();
            let text = turn.text().map(str::to_string);
            if text.is_some() {
                self.last_text.clone_from(&text);
            }
            let calls = match &turn {
                Turn::Assistant { tool_calls, .. } => tool_calls.clone(),
                _ => Vec::new(),
            };

            if let Err(e) = self.conversation.append(turn) {
                return Termination::Failed(e.to_string());
            }
            if calls.is_empty() {
                return Termination::Completed(text.unwrap_or_default());
            }

            self.set_state(RunState::ExecutingTools);
            let results = self.execute_calls(&calls).await;
            if let Err(e) = self.conversation.append(Turn::tool_results(results)) {
                return Termination::Failed(e.to_string());
            }
            self.iteration += 1;
        }
    }

    /// Validate and execute each call in order, one at a time.
    async fn execute_calls(&mut self, calls: &[ToolCallRequest]) -> Vec<ToolCallResult> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            if self.cancel.is_cancelled() {
                debug!(run_id = %self.id, call_id = %call.id, tool = %call.name, "Skipping call after cancellation");
                results.push(ToolCallResult::error(&call.id, CANCELLED_BEFORE_EXECUTION));
                continue;
            }

            self.emit(RunEvent::ToolCallStarted {
                call_id: call.id.clone(),
                name: call.name.clone(),
                args: call.arguments.clone(),
            });

            let started = Instant::now();
            let result = self.executor.run(&self.catalog, call).await;
            debug!(
                run_id = %self.id,
                call_id = %call.id,
                tool = %call.name,
                ok = result.is_ok(),
                duration_ms = started.elapsed().as_millis() as u64,
                "Tool call finished"
            );

            self.tracker
                .record(&call.name, &call.arguments, &result, self.iteration);
            self.emit(RunEvent::ToolCallFinished {
                call_id: call.id.clone(),
                name: call.name.clone(),
                result: result.clone(),
            });
            results.push(result);
        }

        results
    }

    fn finish(self, termination: Termination) -> Finished {
        let artifacts = self.tracker.into_artifacts();
        let last_text = self.last_text;

        let (state, final_text, failure, event) = match termination {
            Termination::Completed(text) => (
                RunState::Completed,
                Some(text.clone()),
                None,
                RunEvent::RunCompleted {
                    final_text: text,
                    artifacts: artifacts.clone(),
                },
            ),
            Termination::Failed(reason) => {
                warn!(run_id = %self.id, reason = %reason, "Run failed");
                (
                    RunState::Failed,
                    None,
                    Some(reason.clone()),
                    RunEvent::RunFailed {
                        reason,
                        last_text: last_text.clone(),
                        artifacts: artifacts.clone(),
                    },
                )
            }
            Termination::LimitReached => (
                RunState::IterationLimitReached,
                None,
                None,
                RunEvent::IterationLimitReached {
                    iterations: self.iteration,
                    last_text: last_text.clone(),
                    artifacts: artifacts.clone(),
                },
            ),
            Termination::Cancelled => (
                RunState::Cancelled,
                None,
                None,
                RunEvent::RunCancelled {
                    last_text: last_text.clone(),
                    artifacts: artifacts.clone(),
                },
            ),
        };

        info!(
            run_id = %self.id,
            state = %state,
            iterations = self.iteration,
            artifacts = artifacts.len(),
            total_tokens = self.usage.total_tokens,
            "Run finished"
        );

        // State first, so a caller reacting to the terminal event sees a finished run.
        self.state.send_replace(state);
        let _ = self.events.send(event);

        Finished {
            outcome: RunOutcome {
                run_id: self.id,
                state,
                iterations: self.iteration,
                final_text,
                last_assistant_text: last_text,
                artifacts,
                failure,
                usage: self.usage,
            },
            conversation: self.conversation,
        }
    }

    fn set_state(&self, state: RunState) {
        self.state.send_replace(state);
    }

    fn emit(&self, event: RunEvent) {
        // The caller may have dropped the stream; the run goes on regardless.
        let _ = self.events.send(event);
    }
}
