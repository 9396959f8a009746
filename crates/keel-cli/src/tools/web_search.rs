//! Web search tool
//!
//! Queries the DuckDuckGo Instant Answer API, which needs no API key.
//! Coverage is limited to topics with instant answers; the tool says so
//! when nothing comes back instead of returning an empty success.

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RELATED: usize = 5;

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "Answer", default)]
    answer: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

#[derive(Debug, Deserialize)]
struct RelatedTopic {
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(rename = "FirstURL", default)]
    first_url: String,
}

/// Tool for answering general queries from the web
pub struct WebSearchTool {
    client: reqwest::Client,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for documentation, libraries, and general technology \
         questions. Returns a summary with source URLs."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let query = match arguments.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolResult::error("Missing 'query' argument"),
        };

        let request = self
            .client
            .get("https://api.duckduckgo.com/")
            .query(&[("q", query), ("format", "json"), ("no_html", "1")])
            .send();

        let response = tokio::select! {
            _ = cancel.cancelled() => return ToolResult::error("Search cancelled"),
            result = request => match result {
                Ok(r) => r,
                Err(e) => return ToolResult::error(format!("Web search failed: {}", e)),
            },
        };

        let answer: InstantAnswer = match response.json().await {
            Ok(a) => a,
            Err(e) => return ToolResult::error(format!("Failed to parse search response: {}", e)),
        };

        let mut sections = Vec::new();
        if !answer.answer.is_empty() {
            sections.push(answer.answer.clone());
        }
        if !answer.abstract_text.is_empty() {
            if answer.abstract_url.is_empty() {
                sections.push(answer.abstract_text.clone());
            } else {
                sections.push(format!(
                    "{}\nSource: {}",
                    answer.abstract_text, answer.abstract_url
                ));
            }
        }

        let related: Vec<String> = answer
            .related_topics
            .iter()
            .filter(|t| !t.text.is_empty())
            .take(MAX_RELATED)
            .map(|t| {
                if t.first_url.is_empty() {
                    format!("- {}", t.text)
                } else {
                    format!("- {} ({})", t.text, t.first_url)
                }
            })
            .collect();
        if !related.is_empty() {
            sections.push(format!("Related:\n{}", related.join("\n")));
        }

        if sections.is_empty() {
            return ToolResult::text(format!(
                "No instant answer found for '{}'. Try more specific terms.",
                query
            ));
        }
        ToolResult::text(sections.join("\n\n"))
    }
}
