//! Glob file pattern matching tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const DEFAULT_LIMIT: usize = 100;

/// Tool for finding files matching a glob pattern
pub struct GlobTool {
    root: PathBuf,
}

impl GlobTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching a glob pattern, e.g. '**/*.rs' or 'src/**/*.ts'. \
         Patterns are relative to the working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 100)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let pattern = match arguments.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing 'pattern' argument"),
        };
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let full_pattern = self.root.join(pattern).to_string_lossy().to_string();
        let entries = match glob::glob(&full_pattern) {
            Ok(paths) => paths,
            Err(e) => return ToolResult::error(format!("Invalid glob pattern: {}", e)),
        };

        let mut results = Vec::new();
        for entry in entries {
            if cancel.is_cancelled() {
                return ToolResult::error("Glob cancelled");
            }
            match entry {
                Ok(path) => {
                    let display = path
                        .strip_prefix(&self.root)
                        .unwrap_or(&path)
                        .display()
                        .to_string();
                    results.push(display);
                    if results.len() >= limit {
                        break;
                    }
                }
                Err(e) => tracing::debug!("glob entry error: {}", e),
            }
        }

        if results.is_empty() {
            return ToolResult::text("No files matched the pattern");
        }

        let truncated = results.len() >= limit;
        let mut output = results.join("\n");
        if truncated {
            output.push_str(&format!("\n\n(showing first {} results)", limit));
        }
        ToolResult::text(output)
    }
}
