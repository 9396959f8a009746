//! Running conversation summary
//!
//! Recent exchanges are kept verbatim up to a size budget; older ones
//! are folded into an LLM-maintained summary with a fast-tier model
//! call. The summary is what callers inject as session context ahead
//! of agent invocations.

use std::collections::VecDeque;
use std::sync::Arc;

use keel_ai::{ChatOptions, ChatProvider, Context, Message, Model};

/// Budget for the verbatim buffer, in characters. Roughly four
/// characters per token.
pub const DEFAULT_MAX_BUFFER_CHARS: usize = 16_000;

const SUMMARY_SYSTEM_PROMPT: &str = "\
You maintain a running summary of a conversation between a user and a
coding assistant.
Given the current summary and new lines of conversation, produce an
updated summary that preserves decisions, constraints, file and symbol
names, and open questions. Respond with the summary text only.";

/// One completed user/assistant exchange held verbatim.
#[derive(Debug, Clone)]
struct Exchange {
    user: String,
    assistant: String,
}

impl Exchange {
    fn len(&self) -> usize {
        self.user.len() + self.assistant.len()
    }
}

/// Summary-plus-recent conversation memory.
///
/// `add_interaction` records each completed turn; once the verbatim
/// buffer overflows its budget the oldest exchanges are summarized
/// away. Summarization failure is never fatal: the exchanges stay in
/// the buffer and folding is retried on the next overflow.
pub struct ContextCompressor {
    provider: Arc<dyn ChatProvider>,
    model: Model,
    options: ChatOptions,
    max_buffer_chars: usize,
    summary: String,
    recent: VecDeque<Exchange>,
}

impl ContextCompressor {
    pub fn new(provider: Arc<dyn ChatProvider>, model: Model) -> Self {
        Self {
            provider,
            model,
            options: ChatOptions {
                max_tokens: Some(1024),
                temperature: Some(0.0),
            },
            max_buffer_chars: DEFAULT_MAX_BUFFER_CHARS,
            summary: String::new(),
            recent: VecDeque::new(),
        }
    }

    pub fn with_max_buffer_chars(mut self, max_buffer_chars: usize) -> Self {
        self.max_buffer_chars = max_buffer_chars;
        self
    }

    /// Record one completed exchange, folding older ones into the
    /// summary when the buffer overflows. Empty exchanges are ignored.
    pub async fn add_interaction(&mut self, user_input: &str, assistant_output: &str) {
        if user_input.is_empty() && assistant_output.is_empty() {
            return;
        }
        self.recent.push_back(Exchange {
            user: user_input.to_string(),
            assistant: assistant_output.to_string(),
        });

        // The newest exchange always stays verbatim.
        let mut overflow = Vec::new();
        while self.buffer_len() > self.max_buffer_chars && self.recent.len() > 1 {
            if let Some(exchange) = self.recent.pop_front() {
                overflow.push(exchange);
            }
        }
        if overflow.is_empty() {
            return;
        }

        match self.fold(&overflow).await {
            Ok(updated) => self.summary = updated,
            Err(e) => {
                tracing::warn!("context summarization failed, keeping exchanges verbatim: {}", e);
                for exchange in overflow.into_iter().rev() {
                    self.recent.push_front(exchange);
                }
            }
        }
    }

    async fn fold(&self, overflow: &[Exchange]) -> keel_ai::Result<String> {
        let mut lines = String::new();
        for exchange in overflow {
            lines.push_str("User: ");
            lines.push_str(&exchange.user);
            lines.push_str("\nAssistant: ");
            lines.push_str(&exchange.assistant);
            lines.push('\n');
        }
        let current = if self.summary.is_empty() {
            "(none)"
        } else {
            self.summary.as_str()
        };
        let prompt = format!("Current summary:\n{}\n\nNew lines:\n{}", current, lines);

        let context = Context {
            system_prompt: Some(SUMMARY_SYSTEM_PROMPT.to_string()),
            messages: vec![Message::user(prompt)],
            tools: vec![],
        };
        let completion = self
            .provider
            .complete(&self.model, &context, &self.options)
            .await?;
        Ok(completion.message.text().trim().to_string())
    }

    /// The running summary of folded-away exchanges. Empty until the
    /// buffer has overflowed at least once.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Reset summary and buffer for a fresh conversation
    pub fn clear(&mut self) {
        self.summary.clear();
        self.recent.clear();
    }

    fn buffer_len(&self) -> usize {
        self.recent.iter().map(Exchange::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keel_ai::{Completion, ModelTier, StopReason, Usage};
    use parking_lot::Mutex;

    struct MockChat {
        responses: Mutex<Vec<keel_ai::Result<Completion>>>,
        calls: Mutex<u32>,
        prompts: Mutex<Vec<String>>,
    }

    impl MockChat {
        fn new(responses: Vec<keel_ai::Result<Completion>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
                prompts: Mutex::new(vec![]),
            })
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
            if let Some(message) = context.messages.first() {
                self.prompts.lock().push(message.text());
            }
            let mut responses = self.responses.lock();
            if responses.is_empty() {
                Ok(summary_completion("fallthrough summary"))
            } else {
                responses.remove(0)
            }
        }
    }

    fn summary_completion(text: &str) -> Completion {
        Completion {
            message: Message::assistant(text),
            usage: Usage::default(),
            stop_reason: StopReason::Stop,
        }
    }

    fn compressor_with(provider: Arc<MockChat>, max_chars: usize) -> ContextCompressor {
        ContextCompressor::new(provider, Model::for_tier(ModelTier::Fast))
            .with_max_buffer_chars(max_chars)
    }

    #[tokio::test]
    async fn test_under_budget_stays_verbatim() {
        let provider = MockChat::new(vec![]);
        let mut compressor = compressor_with(provider.clone(), 1000);

        compressor.add_interaction("hi", "hello").await;
        compressor.add_interaction("list files", "src/main.rs").await;

        assert_eq!(compressor.summary(), "");
        assert_eq!(*provider.calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_overflow_folds_oldest_into_summary() {
        let provider = MockChat::new(vec![Ok(summary_completion(
            "User set up a Rust project and asked about modules.",
        ))]);
        let mut compressor = compressor_with(provider.clone(), 40);

        compressor
            .add_interaction("set up a rust project", "done, created Cargo.toml")
            .await;
        compressor
            .add_interaction("explain modules", "modules group related code")
            .await;

        assert_eq!(
            compressor.summary(),
            "User set up a Rust project and asked about modules."
        );
        assert_eq!(*provider.calls.lock(), 1);
        // The folded lines carry the oldest exchange, not the newest.
        let prompt = provider.prompts.lock()[0].clone();
        assert!(prompt.contains("set up a rust project"));
        assert!(!prompt.contains("explain modules"));
    }

    #[tokio::test]
    async fn test_summary_feeds_into_next_fold() {
        let provider = MockChat::new(vec![
            Ok(summary_completion("first summary")),
            Ok(summary_completion("second summary")),
        ]);
        let mut compressor = compressor_with(provider.clone(), 40);

        compressor.add_interaction("question one here", "answer one here").await;
        compressor.add_interaction("question two here", "answer two here").await;
        compressor.add_interaction("question three here", "answer three here").await;

        assert_eq!(compressor.summary(), "second summary");
        let prompts = provider.prompts.lock();
        assert!(prompts[0].contains("Current summary:\n(none)"));
        assert!(prompts[1].contains("Current summary:\nfirst summary"));
    }

    #[tokio::test]
    async fn test_summarization_failure_keeps_exchanges() {
        let provider = MockChat::new(vec![
            Err(keel_ai::Error::api("overloaded_error", "Overloaded")),
            Ok(summary_completion("recovered summary")),
        ]);
        let mut compressor = compressor_with(provider.clone(), 40);

        compressor.add_interaction("question one here", "answer one here").await;
        compressor.add_interaction("question two here", "answer two here").await;
        assert_eq!(compressor.summary(), "");

        // Next overflow retries and the kept exchange is still there.
        compressor.add_interaction("question three here", "answer three here").await;
        assert_eq!(compressor.summary(), "recovered summary");
        assert!(provider.prompts.lock()[1].contains("question one here"));
    }

    #[tokio::test]
    async fn test_newest_exchange_never_folded() {
        let provider = MockChat::new(vec![]);
        // Budget smaller than a single exchange.
        let mut compressor = compressor_with(provider.clone(), 4);
        compressor.add_interaction("long question", "long answer").await;

        assert_eq!(*provider.calls.lock(), 0);
        assert_eq!(compressor.summary(), "");
    }

    #[tokio::test]
    async fn test_clear_resets() {
        let provider = MockChat::new(vec![Ok(summary_completion("s"))]);
        let mut compressor = compressor_with(provider.clone(), 40);
        compressor.add_interaction("question one here", "answer one here").await;
        compressor.add_interaction("question two here", "answer two here").await;
        assert_eq!(compressor.summary(), "s");

        compressor.clear();
        assert_eq!(compressor.summary(), "");
    }

    #[tokio::test]
    async fn test_empty_exchange_ignored() {
        let provider = MockChat::new(vec![]);
        let mut compressor = compressor_with(provider.clone(), 4);
        compressor.add_interaction("", "").await;
        assert_eq!(compressor.summary(), "");
        assert_eq!(*provider.calls.lock(), 0);
    }
}
