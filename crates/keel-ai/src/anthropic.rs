//! Anthropic Messages API client (non-streaming)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    models::Model,
    provider::{ChatProvider, Completion, RetryConfig},
    types::{
        AssistantMetadata, ChatOptions, Content, Context, Message, StopReason, Usage,
    },
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    retry: RetryConfig,
}

impl AnthropicProvider {
    /// Create a new provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_request(
        &self,
        model: &Model,
        context: &Context,
        options: &ChatOptions,
    ) -> ApiRequest {
        ApiRequest {
            model: model.id.clone(),
            max_tokens: options.max_tokens.unwrap_or(model.max_tokens),
            system: context.system_prompt.clone(),
            messages: convert_messages(&context.messages),
            tools: if context.tools.is_empty() {
                None
            } else {
                Some(
                    context
                        .tools
                        .iter()
                        .map(|t| ApiTool {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            input_schema: t.parameters.clone(),
                        })
                        .collect(),
                )
            },
            temperature: options.temperature,
        }
    }

    async fn send_once(
        &self,
        model: &Model,
        request: &ApiRequest,
    ) -> Result<Completion> {
        let url = format!("{}/v1/messages", model.base_url);
        tracing::debug!(model = %model.id, url = %url, "anthropic request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorResponse>(&body) {
                if status.as_u16() == 429 {
                    return Err(Error::RateLimited { retry_after: None });
                }
                return Err(Error::api(err.error.error_type, err.error.message));
            }
            return Err(Error::UnexpectedResponse(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ApiResponse = serde_json::from_str(&body)?;
        parsed.into_completion()
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &ChatOptions,
    ) -> Result<Completion> {
        let request = self.build_request(model, context, options);

        let mut attempt = 0u32;
        loop {
            match self.send_once(model, &request).await {
                Ok(completion) => return Ok(completion),
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    tracing::warn!(
                        "request failed (attempt {}/{}): {}. retrying in {:?}",
                        attempt + 1,
                        self.retry.max_retries + 1,
                        e,
                        delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ---- wire format ----

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ApiTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not", default)]
        is_error: bool,
    },
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
    model: Option<String>,
    stop_reason: Option<String>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "type", default)]
    error_type: String,
    #[serde(default)]
    message: String,
}

impl ApiResponse {
    fn into_completion(self) -> Result<Completion> {
        let mut content = Vec::new();
        for block in self.content {
            match block {
                ApiContentBlock::Text { text } => content.push(Content::text(text)),
                ApiContentBlock::ToolUse { id, name, input } => {
                    content.push(Content::tool_call(id, name, input));
                }
                ApiContentBlock::ToolResult { .. } => {
                    return Err(Error::UnexpectedResponse(
                        "tool_result block in assistant response".to_string(),
                    ));
                }
            }
        }

        let stop_reason = match self.stop_reason.as_deref() {
            Some("tool_use") => StopReason::ToolUse,
            Some("max_tokens") => StopReason::Length,
            _ => StopReason::Stop,
        };
        let usage = Usage {
            input: self.usage.input_tokens,
            output: self.usage.output_tokens,
        };

        let message = Message::Assistant {
            content,
            metadata: AssistantMetadata {
                model: self.model,
                usage,
                stop_reason: Some(stop_reason),
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
        };

        Ok(Completion {
            message,
            usage,
            stop_reason,
        })
    }
}

/// Convert keel messages into Anthropic wire messages.
///
/// Tool results go back as user-role tool_result blocks, which is what
/// the Messages API expects.
fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
    let mut out = Vec::with_capacity(messages.len());
    for message in messages {
        match message {
            Message::User { content, .. } => {
                let blocks: Vec<ApiContentBlock> = content
                    .iter()
                    .filter_map(|c| {
                        c.as_text().map(|t| ApiContentBlock::Text {
                            text: t.to_string(),
                        })
                    })
                    .collect();
                if !blocks.is_empty() {
                    out.push(ApiMessage {
                        role: "user",
                        content: blocks,
                    });
                }
            }
            Message::Assistant { content, .. } => {
                let blocks: Vec<ApiContentBlock> = content
                    .iter()
                    .map(|c| match c {
                        Content::Text { text } => ApiContentBlock::Text { text: text.clone() },
                        Content::ToolCall {
                            id,
                            name,
                            arguments,
                        } => ApiContentBlock::ToolUse {
                            id: id.clone(),
                            name: name.clone(),
                            input: arguments.clone(),
                        },
                    })
                    .collect();
                if !blocks.is_empty() {
                    out.push(ApiMessage {
                        role: "assistant",
                        content: blocks,
                    });
                }
            }
            Message::ToolResult {
                tool_call_id,
                content,
                is_error,
                ..
            } => {
                let text = content
                    .iter()
                    .filter_map(|c| c.as_text())
                    .collect::<Vec<_>>()
                    .join("\n");
                out.push(ApiMessage {
                    role: "user",
                    content: vec![ApiContentBlock::ToolResult {
                        tool_use_id: tool_call_id.clone(),
                        content: text,
                        is_error: *is_error,
                    }],
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_tool_result_goes_to_user_role() {
        let messages = vec![Message::tool_result(
            "call_1",
            "read",
            vec![Content::text("file contents")],
            false,
        )];
        let converted = convert_messages(&messages);
        assert_eq!(converted.len(), 1);
        assert_eq!(converted[0].role, "user");
        match &converted[0].content[0] {
            ApiContentBlock::ToolResult { tool_use_id, .. } => {
                assert_eq!(tool_use_id, "call_1");
            }
            other => panic!("expected tool_result block, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_skips_empty_user_message() {
        let messages = vec![Message::User {
            content: vec![],
            timestamp: 0,
        }];
        assert!(convert_messages(&messages).is_empty());
    }

    #[test]
    fn test_response_parsing_tool_use() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "let me look"},
                {"type": "tool_use", "id": "toolu_1", "name": "grep", "input": {"pattern": "fn main"}}
            ],
            "model": "claude-haiku-4-5-20251001",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 100, "output_tokens": 20}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let completion = parsed.into_completion().unwrap();
        assert_eq!(completion.stop_reason, StopReason::ToolUse);
        assert_eq!(completion.usage.input, 100);
        let calls = completion.message.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "grep");
    }

    #[test]
    fn test_response_parsing_plain_text() {
        let body = r#"{
            "content": [{"type": "text", "text": "done"}],
            "model": null,
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 5, "output_tokens": 1}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(body).unwrap();
        let completion = parsed.into_completion().unwrap();
        assert_eq!(completion.stop_reason, StopReason::Stop);
        assert_eq!(completion.message.text(), "done");
    }

    #[test]
    fn test_error_body_parsing() {
        let body = r#"{"error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let parsed: ApiErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.error_type, "overloaded_error");
    }
}
