//! Code index query tools
//!
//! Both tools hold a shared handle to the session's index rather than
//! reaching for any global state; the index is injected at startup and
//! populated by the `/index` command.

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::index::IndexHandle;

const DEFAULT_LIMIT: usize = 10;

/// Tool for querying the keyword code index
pub struct CodeSearchTool {
    index: IndexHandle,
}

impl CodeSearchTool {
    pub fn new(index: IndexHandle) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for CodeSearchTool {
    fn name(&self) -> &str {
        "code_search"
    }

    fn description(&self) -> &str {
        "Search the project's code index by keywords. Returns the most relevant files \
         with a matching line from each. Requires the index to be built first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Keywords to search for (identifiers work best)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of files to return (default: 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        let query = match arguments.get("query").and_then(|v| v.as_str()) {
            Some(q) => q,
            None => return ToolResult::error("Missing 'query' argument"),
        };
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let guard = self.index.read();
        let Some(index) = guard.as_ref() else {
            return ToolResult::error(
                "Codebase is not indexed yet. Ask the user to run /index first.",
            );
        };

        let hits = index.search(query, limit);
        if hits.is_empty() {
            return ToolResult::text("No results in the code index for that query");
        }

        let lines: Vec<String> = hits
            .iter()
            .map(|h| {
                format!(
                    "{} (score {})\n  {}: {}",
                    h.path.display(),
                    h.score,
                    h.line_number,
                    h.snippet
                )
            })
            .collect();
        ToolResult::text(lines.join("\n"))
    }
}

/// Tool reporting size counters for the current index
pub struct IndexStatsTool {
    index: IndexHandle,
}

impl IndexStatsTool {
    pub fn new(index: IndexHandle) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for IndexStatsTool {
    fn name(&self) -> &str {
        "index_stats"
    }

    fn description(&self) -> &str {
        "Report whether the code index is built and how many files and terms it holds."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        _arguments: serde_json::Value,
        _cancel: CancellationToken,
    ) -> ToolResult {
        match self.index.read().as_ref() {
            Some(index) => {
                let stats = index.stats();
                ToolResult::text(format!(
                    "Index ready: {} files, {} distinct terms",
                    stats.files, stats.terms
                ))
            }
            None => ToolResult::text("No index built for this session"),
        }
    }
}
