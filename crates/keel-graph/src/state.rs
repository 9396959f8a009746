//! Conversation state threaded through one turn

use keel_ai::Message;
use keel_agent::TaskType;
use serde::{Deserialize, Serialize};

/// The single mutable record carried through a turn.
///
/// `messages` is append-only within the core: steps concatenate their
/// output onto prior history and never truncate or replace it. At the
/// end of any run exactly one of two conditions holds: the messages end
/// in a plain answer, or `human_feedback_needed` is set and the state
/// is suspended awaiting resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnState {
    /// Full conversation history, append-only
    pub messages: Vec<Message>,
    /// Task label resolved for the current turn
    #[serde(default)]
    pub task_type: TaskType,
    /// Name of the agent that last ran; informational
    #[serde(default)]
    pub current_agent: Option<String>,
    /// Auxiliary text (e.g. a running summary) injected ahead of the
    /// history on agent invocation. Never merged into `messages`.
    #[serde(default)]
    pub context: String,
    /// Set when an agent has asked the user a question and the turn is
    /// suspended
    #[serde(default)]
    pub human_feedback_needed: bool,
    /// The question the user must answer, present iff suspended
    #[serde(default)]
    pub clarification_question: Option<String>,
    /// Reserved for a destructive-action confirmation gate. Defined in
    /// the state record but not wired into any transition; no code
    /// reads or sets it.
    #[serde(default)]
    pub pending_confirmation: bool,
    /// Reserved, see `pending_confirmation`
    #[serde(default)]
    pub confirmation_granted: bool,
    /// Directory the session's tools operate in
    #[serde(default)]
    pub working_directory: String,
    /// Whether a code index has been built for this session
    #[serde(default)]
    pub codebase_indexed: bool,
}

impl TurnState {
    /// Fresh state for a new thread
    pub fn new(working_directory: impl Into<String>) -> Self {
        Self {
            messages: vec![],
            task_type: TaskType::Auto,
            current_agent: None,
            context: String::new(),
            human_feedback_needed: false,
            clarification_question: None,
            pending_confirmation: false,
            confirmation_granted: false,
            working_directory: working_directory.into(),
            codebase_indexed: false,
        }
    }

    /// Append a batch of messages produced by a step
    pub fn merge(&mut self, messages: Vec<Message>) {
        self.messages.extend(messages);
    }

    /// Mark the state suspended with a pending question
    pub fn suspend(&mut self, question: impl Into<String>) {
        self.human_feedback_needed = true;
        self.clarification_question = Some(question.into());
    }

    /// Clear the suspension flags
    pub fn clear_clarification(&mut self) {
        self.human_feedback_needed = false;
        self.clarification_question = None;
    }

    /// Whether the state is waiting on a clarification answer
    pub fn is_suspended(&self) -> bool {
        self.human_feedback_needed
    }

    /// Text of the last assistant message, if any
    pub fn last_reply(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role() == "assistant")
            .map(|m| m.text())
    }
}
