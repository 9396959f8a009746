//! File reading tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tokio_util::sync::CancellationToken;

const MAX_LINES: usize = 2000;
const MAX_LINE_LENGTH: usize = 2000;

/// Tool for reading file contents
pub struct ReadTool {
    root: PathBuf,
}

impl ReadTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. For large files, use offset and limit parameters."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the working directory"
                },
                "offset": {
                    "type": "integer",
                    "description": "Line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let path_str = match arguments.get("path").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing 'path' argument"),
        };
        let path = super::resolve_path(&self.root, path_str);

        if cancel.is_cancelled() {
            return ToolResult::error("Operation cancelled");
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let offset = arguments
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|o| (o as usize).saturating_sub(1))
            .unwrap_or(0);
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .map(|l| l as usize)
            .unwrap_or(MAX_LINES);

        if offset >= total_lines && total_lines > 0 {
            return ToolResult::error(format!(
                "Offset {} is beyond end of file ({} lines total)",
                offset + 1,
                total_lines
            ));
        }

        let end = (offset + limit).min(total_lines);
        let mut had_truncated = false;
        let formatted: Vec<String> = lines[offset..end]
            .iter()
            .map(|line| {
                if line.len() > MAX_LINE_LENGTH {
                    had_truncated = true;
                    line.chars().take(MAX_LINE_LENGTH).collect()
                } else {
                    line.to_string()
                }
            })
            .collect();

        let mut output = formatted.join("\n");

        let mut notices = Vec::new();
        if had_truncated {
            notices.push(format!(
                "Some lines were truncated to {} characters",
                MAX_LINE_LENGTH
            ));
        }
        if end < total_lines {
            notices.push(format!(
                "{} more lines not shown. Use offset={} to continue reading",
                total_lines - end,
                end + 1
            ));
        }
        if !notices.is_empty() {
            output.push_str(&format!("\n\n... ({})", notices.join(". ")));
        }

        ToolResult::text(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "line one\nline two\n").unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());

        let result = tool
            .execute("c1", json!({"path": "a.txt"}), CancellationToken::new())
            .await;
        assert!(!result.is_error);
        assert_eq!(result.text_content(), "line one\nline two");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error_result() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());
        let result = tool
            .execute("c1", json!({"path": "nope.txt"}), CancellationToken::new())
            .await;
        assert!(result.is_error);
        assert!(result.text_content().contains("Failed to read"));
    }

    #[tokio::test]
    async fn test_offset_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("n.txt"), "1\n2\n3\n4\n5\n").unwrap();
        let tool = ReadTool::new(dir.path().to_path_buf());

        let result = tool
            .execute(
                "c1",
                json!({"path": "n.txt", "offset": 2, "limit": 2}),
                CancellationToken::new(),
            )
            .await;
        assert!(result.text_content().starts_with("2\n3"));
        assert!(result.text_content().contains("more lines not shown"));
    }
}
