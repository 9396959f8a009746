//! Git inspection tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const GIT_TIMEOUT_SECS: u64 = 10;
const MAX_OUTPUT_SIZE: usize = 50_000;

/// Read-only git operations: status, diff, log.
pub struct GitTool {
    root: PathBuf,
}

impl GitTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GitTool {
    fn name(&self) -> &str {
        "git"
    }

    fn description(&self) -> &str {
        "Inspect the git repository: 'status' for working tree state, 'diff' for \
         uncommitted changes, 'log' for recent commits."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {
                    "type": "string",
                    "enum": ["status", "diff", "log"],
                    "description": "Which inspection to run"
                },
                "path": {
                    "type": "string",
                    "description": "Restrict diff or log to this path (optional)"
                }
            },
            "required": ["operation"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let operation = match arguments.get("operation").and_then(|v| v.as_str()) {
            Some(o) => o,
            None => return ToolResult::error("Missing 'operation' argument"),
        };
        let path = arguments.get("path").and_then(|v| v.as_str());

        let mut args: Vec<&str> = match operation {
            "status" => vec!["status", "--short", "--branch"],
            "diff" => vec!["diff"],
            "log" => vec!["log", "--oneline", "-20"],
            other => {
                return ToolResult::error(format!(
                    "Unknown operation '{}'. Use status, diff, or log.",
                    other
                ))
            }
        };
        if let Some(p) = path {
            if operation != "status" {
                args.push("--");
                args.push(p);
            }
        }

        let child = Command::new("git")
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to run git: {}", e)),
        };

        let timeout = tokio::time::Duration::from_secs(GIT_TIMEOUT_SECS);
        let output = tokio::select! {
            _ = cancel.cancelled() => return ToolResult::error("Git command cancelled"),
            result = tokio::time::timeout(timeout, child.wait_with_output()) => {
                match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => return ToolResult::error(format!("Failed to run git: {}", e)),
                    Err(_) => {
                        return ToolResult::error(format!(
                            "Git command timed out after {} seconds",
                            GIT_TIMEOUT_SECS
                        ))
                    }
                }
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return ToolResult::error(format!("git {} failed: {}", operation, stderr.trim()));
        }

        let mut text = String::from_utf8_lossy(&output.stdout).to_string();
        if text.len() > MAX_OUTPUT_SIZE {
            text.truncate(MAX_OUTPUT_SIZE);
            text.push_str("\n\n... (output truncated)");
        }
        if text.trim().is_empty() {
            text = format!("(git {} produced no output)", operation);
        }
        ToolResult::text(text)
    }
}
