//! RunHandle: the caller's view of one run.

use std::sync::Arc;

use stepwise_core::conversation::ConversationStore;
use stepwise_core::error::{Error, Result};
use stepwise_core::run::{RunConfig, RunId, RunOutcome, RunState};
use stepwise_core::tool::ToolCatalog;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::event::RunEvent;

/// What a run task hands back when it ends.
pub(crate) struct Finished {
    pub outcome: RunOutcome,
    pub conversation: ConversationStore,
}

/// Handle to a run started by [`AgentLoop`](crate::AgentLoop).
///
/// Dropping the handle of a run that is still going cancels it.
pub struct RunHandle {
    id: RunId,
    cancel: CancellationToken,
    state: watch::Receiver<RunState>,
    events: Option<mpsc::UnboundedReceiver<RunEvent>>,
    task: Option<JoinHandle<Finished>>,
    finished: Option<Finished>,
    catalog: Arc<ToolCatalog>,
    config: RunConfig,
}

impl RunHandle {
    pub(crate) fn new(
        id: RunId,
        cancel: CancellationToken,
        state: watch::Receiver<RunState>,
        events: mpsc::UnboundedReceiver<RunEvent>,
        task: JoinHandle<Finished>,
        catalog: Arc<ToolCatalog>,
        config: RunConfig,
    ) -> Self {
        Self {
            id,
            cancel,
            state,
            events: Some(events),
            task: Some(task),
            finished: None,
            catalog,
            config,
        }
    }

    pub fn id(&self) -> &RunId {
        &self.id
    }

    /// Current state of the run.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state.clone()
    }

    /// Take the progress event stream. Returns `None` after the first call.
    pub fn events(&mut self) -> Option<UnboundedReceiverStream<RunEvent>> {
        self.events.take().map(UnboundedReceiverStream::new)
    }

    /// Request cooperative cancellation.
    ///
    /// A tool call already executing finishes; nothing further is dispatched.
    pub fn cancel(&self) -> Result<()> {
        if self.state().is_terminal() {
            return Err(Error::RunNotActive(self.id.to_string()));
        }
        self.cancel.cancel();
        Ok(())
    }

    /// Wait for the run to reach a terminal state and return its outcome.
    pub async fn wait(&mut self) -> Result<RunOutcome> {
        if let Some(task) = self.task.take() {
            let finished = task
                .await
                .map_err(|e| Error::Internal(format!("run {} task failed: {e}", self.id)))?;
            self.finished = Some(finished);
        }
        self.finished
            .as_ref()
            .map(|f| f.outcome.clone())
            .ok_or_else(|| Error::Internal(format!("run {} has no outcome", self.id)))
    }

    /// The outcome, once [`wait`](Self::wait) has returned.
    pub fn outcome(&self) -> Option<&RunOutcome> {
        self.finished.as_ref().map(|f| &f.outcome)
    }

    /// The conversation, once [`wait`](Self::wait) has returned.
    pub fn conversation(&self) -> Option<&ConversationStore> {
        self.finished.as_ref().map(|f| &f.conversation)
    }

    pub(crate) fn conversation_mut(&mut self) -> Option<&mut ConversationStore> {
        self.finished.as_mut().map(|f| &mut f.conversation)
    }

    pub fn catalog(&self) -> &Arc<ToolCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        if !self.state().is_terminal() {
            self.cancel.cancel();
        }
    }
}

impl std::fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("finished", &self.finished.is_some())
            .finish()
    }
}
