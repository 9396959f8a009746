//! Task agent execution
//!
//! All four specialized agents (code, plan, search, ask) are the same
//! `TaskAgent` type holding a different `AgentProfile`. The profile
//! carries the system prompt and model binding; the tool set is bound
//! at construction. Behavior differences between agents live entirely
//! in configuration.

use std::collections::HashMap;
use std::sync::Arc;

use keel_ai::{ChatOptions, ChatProvider, Context, Message, Model};
use tokio_util::sync::CancellationToken;

use crate::clarify::{self, ASK_USER_TOOL};
use crate::tool::{to_api_tool, BoxedTool, Tool, ToolResult};

/// Cap on reasoning-loop iterations per run. A misbehaving model that
/// keeps requesting tools fails closed with a partial-result message
/// instead of looping forever.
pub const DEFAULT_MAX_LOOP_TURNS: u32 = 25;

/// Static configuration for one specialized agent
#[derive(Debug, Clone)]
pub struct AgentProfile {
    /// Agent identifier (e.g. "code_agent")
    pub name: String,
    /// System instructions defining the agent's role
    pub system_prompt: String,
    /// Model this agent runs on
    pub model: Model,
    /// Sampling options
    pub options: ChatOptions,
}

/// Result of one agent run.
///
/// `messages` holds everything produced during the loop (assistant
/// messages, tool calls, tool results) in emission order, ready to be
/// merged into conversation state. `clarification` is set when the
/// agent needs user input before it can usefully continue.
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    pub messages: Vec<Message>,
    pub clarification: Option<String>,
}

impl AgentOutcome {
    /// Whether this run requested human feedback
    pub fn needs_feedback(&self) -> bool {
        self.clarification.is_some()
    }
}

/// A tool-using agent bound to a profile and a fixed tool set.
///
/// Stateless per instance: conversation state is passed in per run and
/// new messages are returned, never stored.
pub struct TaskAgent {
    profile: AgentProfile,
    provider: Arc<dyn ChatProvider>,
    tools: Vec<BoxedTool>,
    max_loop_turns: u32,
    /// Compiled JSON schema validators keyed by tool name
    schema_cache: HashMap<String, Arc<jsonschema::Validator>>,
}

impl TaskAgent {
    /// Create a new agent
    pub fn new(
        profile: AgentProfile,
        provider: Arc<dyn ChatProvider>,
        tools: Vec<BoxedTool>,
    ) -> Self {
        let mut agent = Self {
            profile,
            provider,
            tools: vec![],
            max_loop_turns: DEFAULT_MAX_LOOP_TURNS,
            schema_cache: HashMap::new(),
        };
        for tool in tools {
            agent.add_tool(tool);
        }
        agent
    }

    /// Override the loop iteration cap
    pub fn with_max_loop_turns(mut self, max: u32) -> Self {
        self.max_loop_turns = max;
        self
    }

    /// Agent name from the profile
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Names of the bound tools
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    fn add_tool(&mut self, tool: BoxedTool) {
        let schema = tool.parameters_schema();
        match jsonschema::validator_for(&schema) {
            Ok(validator) => {
                self.schema_cache
                    .insert(tool.name().to_string(), Arc::new(validator));
            }
            Err(e) => {
                tracing::warn!(
                    "Invalid tool parameter schema for '{}', skipping validation: {}",
                    tool.name(),
                    e
                );
            }
        }
        self.tools.push(tool);
    }

    fn build_context(&self, history: &[Message], produced: &[Message]) -> Context {
        let mut tools: Vec<keel_ai::Tool> =
            self.tools.iter().map(|t| to_api_tool(t.as_ref())).collect();
        tools.push(clarify::ask_user_tool());

        Context {
            system_prompt: Some(self.profile.system_prompt.clone()),
            messages: history
                .iter()
                .cloned()
                .chain(produced.iter().cloned())
                .collect(),
            tools,
        }
    }

    /// Run the agent against the current conversation history.
    ///
    /// Never returns an error: provider failures are converted into a
    /// single assistant-role error message and the run completes.
    pub async fn run(&self, history: &[Message], cancel: CancellationToken) -> AgentOutcome {
        let mut produced: Vec<Message> = vec![];
        let mut turn = 0u32;

        let clarification = loop {
            turn += 1;
            if turn > self.max_loop_turns {
                tracing::warn!(
                    agent = %self.profile.name,
                    "reached loop cap of {} turns, stopping",
                    self.max_loop_turns
                );
                produced.push(Message::assistant(format!(
                    "I stopped after {} reasoning steps without finishing the task. \
                     Here is what I have so far; you may want to narrow the request \
                     and try again.",
                    self.max_loop_turns
                )));
                break None;
            }

            let context = self.build_context(history, &produced);
            let completion = match self
                .provider
                .complete(&self.profile.model, &context, &self.profile.options)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(agent = %self.profile.name, "agent run failed: {}", e);
                    produced.push(Message::assistant(format!(
                        "I encountered an error: {}\n\nPlease try rephrasing your request.",
                        e
                    )));
                    break None;
                }
            };

            produced.push(completion.message.clone());

            let tool_calls: Vec<(String, String, serde_json::Value)> = completion
                .message
                .tool_calls()
                .into_iter()
                .map(|(id, name, args)| (id.to_string(), name.to_string(), args.clone()))
                .collect();

            if tool_calls.is_empty() {
                // Compatibility fallback: scan the final text for an
                // in-band clarification marker.
                break clarify::find_marker(&completion.message.text());
            }

            match self.execute_tool_calls(tool_calls, &cancel, &mut produced).await {
                Some(question) => break Some(question),
                None => continue,
            }
        };

        AgentOutcome {
            messages: produced,
            clarification,
        }
    }

    /// Execute a batch of tool calls, appending results to `produced`.
    ///
    /// An `ask_user` call short-circuits the batch: it gets a synthetic
    /// result (so the transcript stays well formed), the remaining calls
    /// are answered with skip results, and the question is returned.
    async fn execute_tool_calls(
        &self,
        tool_calls: Vec<(String, String, serde_json::Value)>,
        cancel: &CancellationToken,
        produced: &mut Vec<Message>,
    ) -> Option<String> {
        for (idx, (id, name, args)) in tool_calls.iter().enumerate() {
            if name == ASK_USER_TOOL {
                let question = args
                    .get("question")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Please provide clarification.")
                    .trim()
                    .to_string();
                produced.push(Message::tool_result(
                    id,
                    name,
                    vec![keel_ai::Content::text("Question passed to the user.")],
                    false,
                ));
                self.skip_remaining(&tool_calls[idx + 1..], produced);
                return Some(question);
            }

            let result = self.execute_one(name, args, cancel.clone()).await;
            tracing::debug!(
                agent = %self.profile.name,
                tool = %name,
                is_error = result.is_error,
                "tool executed"
            );
            produced.push(Message::tool_result(
                id,
                name,
                result.content,
                result.is_error,
            ));
        }
        None
    }

    async fn execute_one(
        &self,
        name: &str,
        args: &serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let Some(tool) = self.tools.iter().find(|t| t.name() == name) else {
            return ToolResult::error(format!("Tool not found: {}", name));
        };

        if let Some(validator) = self.schema_cache.get(name) {
            let errors: Vec<String> = validator
                .iter_errors(args)
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        e.to_string()
                    } else {
                        format!("{}: {}", path, e)
                    }
                })
                .collect();
            if !errors.is_empty() {
                return ToolResult::error(format!(
                    "Tool argument validation failed:\n{}",
                    errors.join("\n")
                ));
            }
        }

        tool.execute("", args.clone(), cancel).await
    }

    /// Answer remaining tool calls with skip results so every tool_use
    /// block in the transcript has a matching result.
    fn skip_remaining(
        &self,
        remaining: &[(String, String, serde_json::Value)],
        produced: &mut Vec<Message>,
    ) {
        for (id, name, _) in remaining {
            produced.push(Message::tool_result(
                id,
                name,
                vec![keel_ai::Content::text(
                    "Skipped: waiting for user clarification",
                )],
                true,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keel_ai::{
        AssistantMetadata, Completion, Content, ModelTier, StopReason, Usage,
    };
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockChat {
        responses: Mutex<Vec<keel_ai::Result<Completion>>>,
        calls: Mutex<u32>,
    }

    impl MockChat {
        fn new(responses: Vec<keel_ai::Result<Completion>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for MockChat {
        async fn complete(
            &self,
            _model: &Model,
            _context: &Context,
            _options: &ChatOptions,
        ) -> keel_ai::Result<Completion> {
            *self.calls.lock() += 1;
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(text_completion("done"))
            } else {
                responses.remove(0)
            }
        }
    }

    fn text_completion(text: &str) -> Completion {
        Completion {
            message: Message::assistant(text),
            usage: Usage::default(),
            stop_reason: StopReason::Stop,
        }
    }

    fn tool_call_completion(calls: Vec<(&str, &str, serde_json::Value)>) -> Completion {
        let content = calls
            .into_iter()
            .map(|(id, name, args)| Content::tool_call(id, name, args))
            .collect();
        Completion {
            message: Message::Assistant {
                content,
                metadata: AssistantMetadata::default(),
            },
            usage: Usage::default(),
            stop_reason: StopReason::ToolUse,
        }
    }

    struct CountingTool {
        tool_name: String,
        count: Arc<AtomicU32>,
    }

    impl CountingTool {
        fn new(name: &str) -> (BoxedTool, Arc<AtomicU32>) {
            let count = Arc::new(AtomicU32::new(0));
            (
                Arc::new(Self {
                    tool_name: name.to_string(),
                    count: count.clone(),
                }),
                count,
            )
        }
    }

    #[async_trait]
    impl crate::tool::Tool for CountingTool {
        fn name(&self) -> &str {
            &self.tool_name
        }
        fn description(&self) -> &str {
            "A counting test tool"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" }
                },
                "required": ["path"]
            })
        }
        async fn execute(
            &self,
            _tool_call_id: &str,
            _arguments: serde_json::Value,
            _cancel: CancellationToken,
        ) -> ToolResult {
            self.count.fetch_add(1, Ordering::Relaxed);
            ToolResult::text("ok")
        }
    }

    fn make_agent(provider: Arc<MockChat>, tools: Vec<BoxedTool>) -> TaskAgent {
        TaskAgent::new(
            AgentProfile {
                name: "test_agent".to_string(),
                system_prompt: "You are a test agent.".to_string(),
                model: Model::for_tier(ModelTier::Fast),
                options: ChatOptions::default(),
            },
            provider,
            tools,
        )
    }

    #[tokio::test]
    async fn test_plain_answer_no_clarification() {
        let provider = MockChat::new(vec![Ok(text_completion("the answer is 42"))]);
        let agent = make_agent(provider, vec![]);

        let outcome = agent
            .run(&[Message::user("what is it?")], CancellationToken::new())
            .await;

        assert!(!outcome.needs_feedback());
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.messages[0].text(), "the answer is 42");
    }

    #[tokio::test]
    async fn test_tool_loop_then_answer() {
        let (tool, count) = CountingTool::new("read");
        let provider = MockChat::new(vec![
            Ok(tool_call_completion(vec![(
                "c1",
                "read",
                serde_json::json!({"path": "src/main.rs"}),
            )])),
            Ok(text_completion("read it, here is a summary")),
        ]);
        let agent = make_agent(provider, vec![tool]);

        let outcome = agent
            .run(&[Message::user("summarize main.rs")], CancellationToken::new())
            .await;

        assert_eq!(count.load(Ordering::Relaxed), 1);
        // assistant(tool call) + tool result + assistant(answer)
        assert_eq!(outcome.messages.len(), 3);
        assert_eq!(outcome.messages[1].role(), "tool_result");
        assert!(!outcome.needs_feedback());
    }

    #[tokio::test]
    async fn test_provider_error_becomes_assistant_message() {
        let provider = MockChat::new(vec![Err(keel_ai::Error::api(
            "overloaded_error",
            "Overloaded",
        ))]);
        let agent = make_agent(provider.clone(), vec![]);

        let outcome = agent
            .run(&[Message::user("hi")], CancellationToken::new())
            .await;

        assert!(!outcome.needs_feedback());
        assert_eq!(outcome.messages.len(), 1);
        let text = outcome.messages[0].text();
        assert!(text.contains("I encountered an error"), "got: {}", text);
        // No retry at the agent layer.
        assert_eq!(*provider.calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_returns_error_result() {
        let provider = MockChat::new(vec![
            Ok(tool_call_completion(vec![(
                "c1",
                "nonexistent",
                serde_json::json!({}),
            )])),
            Ok(text_completion("ok, giving up on that tool")),
        ]);
        let agent = make_agent(provider, vec![]);

        let outcome = agent
            .run(&[Message::user("go")], CancellationToken::new())
            .await;

        match &outcome.messages[1] {
            Message::ToolResult { is_error, content, .. } => {
                assert!(is_error);
                let text = content[0].as_text().unwrap();
                assert!(text.contains("Tool not found"), "got: {}", text);
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_schema_validation_rejects_bad_args() {
        let (tool, count) = CountingTool::new("read");
        let provider = MockChat::new(vec![
            // Missing required "path"
            Ok(tool_call_completion(vec![(
                "c1",
                "read",
                serde_json::json!({"offset": 3}),
            )])),
            Ok(text_completion("fine")),
        ]);
        let agent = make_agent(provider, vec![tool]);

        let outcome = agent
            .run(&[Message::user("go")], CancellationToken::new())
            .await;

        assert_eq!(count.load(Ordering::Relaxed), 0, "tool must not run");
        match &outcome.messages[1] {
            Message::ToolResult { is_error, content, .. } => {
                assert!(is_error);
                assert!(content[0]
                    .as_text()
                    .unwrap()
                    .contains("validation failed"));
            }
            other => panic!("expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_ask_user_tool_suspends() {
        let provider = MockChat::new(vec![Ok(tool_call_completion(vec![(
            "c1",
            ASK_USER_TOOL,
            serde_json::json!({"question": "  Which database?  "}),
        )]))]);
        let agent = make_agent(provider, vec![]);

        let outcome = agent
            .run(&[Message::user("set up storage")], CancellationToken::new())
            .await;

        assert_eq!(outcome.clarification.as_deref(), Some("Which database?"));
        // The ask_user call still gets a synthetic result.
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[1].role(), "tool_result");
    }

    #[tokio::test]
    async fn test_ask_user_skips_remaining_calls() {
        let (tool, count) = CountingTool::new("read");
        let provider = MockChat::new(vec![Ok(tool_call_completion(vec![
            ("c1", ASK_USER_TOOL, serde_json::json!({"question": "Which?"})),
            ("c2", "read", serde_json::json!({"path": "a.rs"})),
        ]))]);
        let agent = make_agent(provider, vec![tool]);

        let outcome = agent
            .run(&[Message::user("go")], CancellationToken::new())
            .await;

        assert_eq!(outcome.clarification.as_deref(), Some("Which?"));
        assert_eq!(count.load(Ordering::Relaxed), 0, "read must be skipped");
        // assistant + ask_user result + skip result
        assert_eq!(outcome.messages.len(), 3);
    }

    #[tokio::test]
    async fn test_marker_fallback_in_final_text() {
        let provider = MockChat::new(vec![Ok(text_completion(
            "I need more info. [CLARIFY]Which database?[/CLARIFY]",
        ))]);
        let agent = make_agent(provider, vec![]);

        let outcome = agent
            .run(&[Message::user("set up storage")], CancellationToken::new())
            .await;

        assert_eq!(outcome.clarification.as_deref(), Some("Which database?"));
    }

    #[tokio::test]
    async fn test_marker_in_intermediate_message_ignored() {
        let (tool, _count) = CountingTool::new("read");
        let provider = MockChat::new(vec![
            Ok(Completion {
                message: Message::Assistant {
                    content: vec![
                        Content::text("[CLARIFY]ignore me[/CLARIFY]"),
                        Content::tool_call("c1", "read", serde_json::json!({"path": "a"})),
                    ],
                    metadata: AssistantMetadata::default(),
                },
                usage: Usage::default(),
                stop_reason: StopReason::ToolUse,
            }),
            Ok(text_completion("final answer, no questions")),
        ]);
        let agent = make_agent(provider, vec![tool]);

        let outcome = agent
            .run(&[Message::user("go")], CancellationToken::new())
            .await;

        assert!(outcome.clarification.is_none());
    }

    #[tokio::test]
    async fn test_loop_cap_fails_closed() {
        // Provider that always requests another tool call.
        let (tool, count) = CountingTool::new("read");
        let mut responses: Vec<keel_ai::Result<Completion>> = vec![];
        for _ in 0..10 {
            responses.push(Ok(tool_call_completion(vec![(
                "c1",
                "read",
                serde_json::json!({"path": "a.rs"}),
            )])));
        }
        let provider = MockChat::new(responses);
        let agent = make_agent(provider, vec![tool]).with_max_loop_turns(3);

        let outcome = agent
            .run(&[Message::user("go")], CancellationToken::new())
            .await;

        assert_eq!(count.load(Ordering::Relaxed), 3);
        let last = outcome.messages.last().unwrap().text();
        assert!(last.contains("stopped after 3 reasoning steps"), "got: {}", last);
        assert!(!outcome.needs_feedback());
    }
}
