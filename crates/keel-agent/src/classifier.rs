//! Intent classification
//!
//! One cheap model call that maps the latest user message onto a task
//! label before dispatch. Classification failure is never fatal: any
//! error, and any output that is not one of the four labels, degrades
//! to `ask`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use keel_ai::{ChatOptions, ChatProvider, Context, Message, Model};

/// How many trailing messages are sent to the classifier. Keeps the
/// call cheap on long conversations.
const CLASSIFY_WINDOW: usize = 3;

const ROUTER_SYSTEM_PROMPT: &str = "\
You are a task classifier for a coding assistant.
Classify the user's latest message into exactly one category.

Categories:
- code: Writing new code, modifying existing code, debugging, refactoring, code review
- plan: Architecture decisions, project planning, breaking down tasks, design discussions
- search: Looking up documentation, finding libraries, researching technologies, web queries
- ask: General questions, explanations, how-things-work, code understanding, everything else

Rules:
- Respond with ONLY the single lowercase word: code, plan, search, or ask
- When in doubt, use 'ask'
- If the message is about writing or changing code files, use 'code'";

/// Task label for routing a turn to a specialized agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Code,
    Plan,
    Search,
    Ask,
    /// Not yet resolved; the classifier decides.
    #[default]
    Auto,
}

impl TaskType {
    /// Parse a task type, including `auto`. Returns None for anything
    /// unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "code" => Some(Self::Code),
            "plan" => Some(Self::Plan),
            "search" => Some(Self::Search),
            "ask" => Some(Self::Ask),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Plan => "plan",
            Self::Search => "search",
            Self::Ask => "ask",
            Self::Auto => "auto",
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lightweight classifier: one fast-tier model call, no tools.
pub struct IntentClassifier {
    provider: Arc<dyn ChatProvider>,
    model: Model,
    options: ChatOptions,
}

impl IntentClassifier {
    pub fn new(provider: Arc<dyn ChatProvider>, model: Model) -> Self {
        Self {
            provider,
            model,
            options: ChatOptions {
                // A label is one token; leave headroom for chatty models.
                max_tokens: Some(16),
                temperature: Some(0.0),
            },
        }
    }

    /// Classify the user's intent from recent conversation history.
    ///
    /// The window holds only text-bearing user/assistant messages; tool
    /// results and tool-call blocks are stripped so the request never
    /// carries a tool_result without its paired tool_use. Empty history
    /// returns `ask` without calling the model.
    pub async fn classify(&self, messages: &[Message]) -> TaskType {
        let window = text_window(messages);
        if window.is_empty() {
            return TaskType::Ask;
        }

        let context = Context {
            system_prompt: Some(ROUTER_SYSTEM_PROMPT.to_string()),
            messages: window,
            tools: vec![],
        };

        match self
            .provider
            .complete(&self.model, &context, &self.options)
            .await
        {
            Ok(completion) => parse_label(&completion.message.text()),
            Err(e) => {
                tracing::debug!("classification failed, defaulting to ask: {}", e);
                TaskType::Ask
            }
        }
    }
}

/// Rebuild the trailing window as plain text messages. Tool results are
/// dropped and assistant messages are reduced to their text, so the
/// window is always a valid standalone transcript.
fn text_window(messages: &[Message]) -> Vec<Message> {
    let mut window: Vec<Message> = messages
        .iter()
        .rev()
        .filter_map(|m| {
            let text = m.text();
            if text.is_empty() {
                return None;
            }
            match m.role() {
                "user" => Some(Message::user(text)),
                "assistant" => Some(Message::assistant(text)),
                _ => None,
            }
        })
        .take(CLASSIFY_WINDOW)
        .collect();
    window.reverse();
    window
}

/// Map a raw model response onto a label. Takes the first
/// whitespace-delimited token, lowercased; anything that is not one of
/// the four labels becomes `ask`.
fn parse_label(response: &str) -> TaskType {
    let token = response
        .trim()
        .to_lowercase()
        .split_whitespace()
        .next()
        .map(str::to_string)
        .unwrap_or_default();

    match token.as_str() {
        "code" => TaskType::Code,
        "plan" => TaskType::Plan,
        "search" => TaskType::Search,
        "ask" => TaskType::Ask,
        _ => TaskType::Ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keel_ai::{Completion, StopReason, Usage};
    use parking_lot::Mutex;

    /// Mock provider returning canned responses, recording call counts
    /// and the message windows it was sent.
    struct MockChat {
        responses: Mutex<Vec<keel_ai::Result<Completion>>>,
        calls: Mutex<u32>,
        windows: Mutex<Vec<Vec<Message>>>,
    }

    impl MockChat {
        fn new(responses: Vec<keel_ai::Result<Completion>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
                windows: Mutex::new(vec![]),
            }
        }

        fn replying(text: &str) -> Self {
            Self::new(vec![Ok(completion_of(text))])
        }
    }

    fn completion_of(text: &str) -> Completion {
        Completion {
            message: Message::assistant(text),
            usage: Usage::default(),
            stop_reason: StopReason::Stop,
        }
    }

    #[async_trait]
    impl ChatProvider for MockChat {
        async fn complete(
            &self,
            _model: &Model,
            context: &Context,
            _options: &ChatOptions,
        ) -> keel_ai::Result<Completion> {
            *self.calls.lock() += 1;
            self.windows.lock().push(context.messages.clone());
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(completion_of("ask"))
            } else {
                responses.remove(0)
            }
        }
    }

    fn classifier_with(mock: MockChat) -> (IntentClassifier, Arc<MockChat>) {
        let mock = Arc::new(mock);
        let classifier = IntentClassifier::new(
            mock.clone(),
            Model::for_tier(keel_ai::ModelTier::Fast),
        );
        (classifier, mock)
    }

    #[tokio::test]
    async fn test_empty_history_skips_model_call() {
        let (classifier, mock) = classifier_with(MockChat::replying("code"));
        let result = classifier.classify(&[]).await;
        assert_eq!(result, TaskType::Ask);
        assert_eq!(*mock.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_classify_code() {
        let (classifier, _) = classifier_with(MockChat::replying("code"));
        let result = classifier
            .classify(&[Message::user("Write a function to reverse a string")])
            .await;
        assert_eq!(result, TaskType::Code);
    }

    #[tokio::test]
    async fn test_classify_takes_first_token() {
        let (classifier, _) = classifier_with(MockChat::replying("  Plan, since this is a design task"));
        let result = classifier.classify(&[Message::user("design my api")]).await;
        assert_eq!(result, TaskType::Plan);
    }

    #[tokio::test]
    async fn test_unrecognized_label_defaults_to_ask() {
        let (classifier, _) = classifier_with(MockChat::replying("refactor"));
        let result = classifier.classify(&[Message::user("hm")]).await;
        assert_eq!(result, TaskType::Ask);
    }

    #[tokio::test]
    async fn test_empty_response_defaults_to_ask() {
        let (classifier, _) = classifier_with(MockChat::replying("   "));
        let result = classifier.classify(&[Message::user("hm")]).await;
        assert_eq!(result, TaskType::Ask);
    }

    #[tokio::test]
    async fn test_provider_error_defaults_to_ask() {
        let (classifier, mock) = classifier_with(MockChat::new(vec![Err(
            keel_ai::Error::api("overloaded_error", "Overloaded"),
        )]));
        let result = classifier.classify(&[Message::user("hm")]).await;
        assert_eq!(result, TaskType::Ask);
        // Exactly one call, no retry at this layer.
        assert_eq!(*mock.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_window_drops_tool_messages() {
        use keel_ai::{AssistantMetadata, Content};

        let (classifier, mock) = classifier_with(MockChat::replying("code"));
        // History from a tool-using turn: the tool_use block's pair
        // would fall outside a raw 3-message slice.
        let history = vec![
            Message::user("rename the struct"),
            Message::Assistant {
                content: vec![Content::tool_call("c1", "grep", serde_json::json!({"pattern": "Foo"}))],
                metadata: AssistantMetadata::default(),
            },
            Message::tool_result("c1", "grep", vec![Content::text("src/lib.rs:3")], false),
            Message::assistant("Renamed Foo to Bar."),
            Message::user("now add a test for it"),
        ];

        let result = classifier.classify(&history).await;
        assert_eq!(result, TaskType::Code);

        let windows = mock.windows.lock();
        let window = &windows[0];
        assert_eq!(window.len(), 3);
        assert!(window.iter().all(|m| m.role() != "tool_result"));
        assert!(window.iter().all(|m| m.tool_calls().is_empty()));
        assert_eq!(window[0].text(), "rename the struct");
        assert_eq!(window[2].text(), "now add a test for it");
    }

    #[tokio::test]
    async fn test_window_of_only_tool_messages_skips_model_call() {
        use keel_ai::Content;

        let (classifier, mock) = classifier_with(MockChat::replying("code"));
        let history = vec![Message::tool_result(
            "c1",
            "grep",
            vec![Content::text("hit")],
            false,
        )];
        let result = classifier.classify(&history).await;
        assert_eq!(result, TaskType::Ask);
        assert_eq!(*mock.calls.lock(), 0);
    }

    #[test]
    fn test_parse_label_variants() {
        assert_eq!(parse_label("search"), TaskType::Search);
        assert_eq!(parse_label("ASK"), TaskType::Ask);
        assert_eq!(parse_label("code\nextra"), TaskType::Code);
        assert_eq!(parse_label(""), TaskType::Ask);
        assert_eq!(parse_label("auto"), TaskType::Ask);
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!(TaskType::parse("plan"), Some(TaskType::Plan));
        assert_eq!(TaskType::parse("AUTO"), Some(TaskType::Auto));
        assert_eq!(TaskType::parse("gibberish"), None);
    }
}
