//! Turn dispatch and the suspend/resume boundary

use std::collections::HashMap;
use std::sync::Arc;

use keel_ai::Message;
use keel_agent::{IntentClassifier, TaskAgent, TaskType};
use tokio_util::sync::CancellationToken;

use crate::checkpoint::CheckpointStore;
use crate::error::{Error, Result};
use crate::state::TurnState;

/// Result of driving one turn through the state machine.
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// The turn ran to completion; the last message is the reply
    Completed(TurnState),
    /// The turn is paused on a question; resume with the user's answer
    Suspended { question: String, state: TurnState },
}

impl TurnOutcome {
    /// The state regardless of outcome
    pub fn state(&self) -> &TurnState {
        match self {
            Self::Completed(state) => state,
            Self::Suspended { state, .. } => state,
        }
    }

    /// The pending question, if suspended
    pub fn question(&self) -> Option<&str> {
        match self {
            Self::Completed(_) => None,
            Self::Suspended { question, .. } => Some(question),
        }
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// The turn state machine.
///
/// Holds the classifier, one agent per task label, and the checkpoint
/// store. Agents and classifier are built once at startup and shared;
/// all per-turn state lives in `TurnState` under the checkpoint store.
pub struct TurnGraph {
    classifier: IntentClassifier,
    agents: HashMap<TaskType, Arc<TaskAgent>>,
    checkpoints: Arc<dyn CheckpointStore>,
    working_directory: String,
}

impl TurnGraph {
    pub fn new(
        classifier: IntentClassifier,
        agents: HashMap<TaskType, Arc<TaskAgent>>,
        checkpoints: Arc<dyn CheckpointStore>,
        working_directory: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            agents,
            checkpoints,
            working_directory: working_directory.into(),
        }
    }

    /// Run one turn for a thread.
    ///
    /// Infallible by design: classification failures degrade to `ask`,
    /// agent failures become an inline assistant message, and the
    /// in-memory checkpoint path has no I/O to fail. `task_override`
    /// other than `Auto` bypasses the classifier entirely.
    pub async fn invoke(
        &self,
        thread_id: &str,
        user_text: &str,
        task_override: TaskType,
        cancel: CancellationToken,
    ) -> TurnOutcome {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .unwrap_or_else(|| TurnState::new(self.working_directory.clone()));

        // A fresh turn never starts suspended.
        state.clear_clarification();
        state.merge(vec![Message::user(user_text)]);

        let task = if task_override.is_auto() {
            self.classifier.classify(&state.messages).await
        } else {
            task_override
        };
        let routed = route(task);
        state.task_type = routed;
        tracing::info!(thread = %thread_id, task = %routed, "dispatching turn");
        self.checkpoints.save(thread_id, &state);

        // Session context rides ahead of the history for the agent's
        // benefit but is never merged into the saved messages.
        let agent_input: Vec<Message> = if state.context.is_empty() {
            state.messages.clone()
        } else {
            let mut input = Vec::with_capacity(state.messages.len() + 1);
            input.push(Message::user(format!("Session context:\n{}", state.context)));
            input.extend(state.messages.iter().cloned());
            input
        };

        let outcome = match self.agents.get(&routed) {
            Some(agent) => {
                state.current_agent = Some(agent.name().to_string());
                agent.run(&agent_input, cancel).await
            }
            None => {
                // Misconfiguration, not a user error. Keep the turn alive.
                tracing::error!(task = %routed, "no agent configured for task");
                keel_agent::AgentOutcome {
                    messages: vec![Message::assistant(format!(
                        "No agent is configured for '{}' tasks.",
                        routed
                    ))],
                    clarification: None,
                }
            }
        };

        state.merge(outcome.messages);

        match outcome.clarification {
            Some(question) => {
                state.suspend(question.clone());
                self.checkpoints.save(thread_id, &state);
                TurnOutcome::Suspended { question, state }
            }
            None => {
                self.checkpoints.save(thread_id, &state);
                TurnOutcome::Completed(state)
            }
        }
    }

    /// Answer a suspended thread's question.
    ///
    /// Appends the answer as a user message, clears the suspension
    /// flags, and ends the turn. The answer is not fed back into the
    /// originating agent; it becomes part of history for the next turn.
    pub fn resume(&self, thread_id: &str, answer: &str) -> Result<TurnOutcome> {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .ok_or_else(|| Error::UnknownThread(thread_id.to_string()))?;

        if !state.is_suspended() {
            return Err(Error::NotSuspended(thread_id.to_string()));
        }

        state.merge(vec![Message::user(answer)]);
        state.clear_clarification();
        self.checkpoints.save(thread_id, &state);
        tracing::info!(thread = %thread_id, "resumed with clarification answer");
        Ok(TurnOutcome::Completed(state))
    }

    /// Latest checkpoint for a thread, if one exists
    pub fn state_of(&self, thread_id: &str) -> Option<TurnState> {
        self.checkpoints.load(thread_id)
    }

    /// Replace the session context injected ahead of agent input.
    /// Callers typically feed this from a running conversation summary.
    pub fn set_context(&self, thread_id: &str, context: impl Into<String>) {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .unwrap_or_else(|| TurnState::new(self.working_directory.clone()));
        state.context = context.into();
        self.checkpoints.save(thread_id, &state);
    }

    /// Record that a code index was built for this session
    pub fn mark_indexed(&self, thread_id: &str) {
        let mut state = self
            .checkpoints
            .load(thread_id)
            .unwrap_or_else(|| TurnState::new(self.working_directory.clone()));
        state.codebase_indexed = true;
        self.checkpoints.save(thread_id, &state);
    }

    /// Drop a thread's checkpoint. Starting a new conversation should
    /// allocate a fresh thread id rather than reuse a discarded one.
    pub fn discard(&self, thread_id: &str) {
        self.checkpoints.discard(thread_id);
    }
}

/// Map a task label onto a configured agent slot. Anything outside the
/// four concrete labels falls through to `ask`.
fn route(task: TaskType) -> TaskType {
    match task {
        TaskType::Code | TaskType::Plan | TaskType::Search => task,
        _ => TaskType::Ask,
    }
}
