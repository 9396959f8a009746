//! Allowlisted shell command tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

const MAX_OUTPUT_SIZE: usize = 100_000;

/// Tool for running shell commands in the working directory.
///
/// Only programs on the configured allowlist may run; the check applies
/// to the first token of the command line. Every invocation gets a
/// timeout.
pub struct ShellTool {
    root: PathBuf,
    allowed_commands: Vec<String>,
    timeout_secs: u64,
}

impl ShellTool {
    pub fn new(root: PathBuf, allowed_commands: Vec<String>, timeout_secs: u64) -> Self {
        Self {
            root,
            allowed_commands,
            timeout_secs,
        }
    }

    fn is_allowed(&self, command: &str) -> bool {
        let Some(program) = command.split_whitespace().next() else {
            return false;
        };
        // Compare on the basename so "/usr/bin/git" matches "git".
        let program = program.rsplit('/').next().unwrap_or(program);
        self.allowed_commands.iter().any(|a| a == program)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Run a shell command in the working directory. Only allowlisted programs may \
         run. Returns stdout and stderr."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command line to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let command = match arguments.get("command").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("Missing 'command' argument"),
        };

        if !self.is_allowed(command) {
            return ToolResult::error(format!(
                "Command not allowed: '{}'. Allowed programs: {}",
                command.split_whitespace().next().unwrap_or(""),
                self.allowed_commands.join(", ")
            ));
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let child = match child {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to spawn command: {}", e)),
        };

        let timeout = tokio::time::Duration::from_secs(self.timeout_secs);
        let output = tokio::select! {
            _ = cancel.cancelled() => {
                return ToolResult::error("Command cancelled");
            }
            result = tokio::time::timeout(timeout, child.wait_with_output()) => {
                match result {
                    Ok(Ok(output)) => output,
                    Ok(Err(e)) => {
                        return ToolResult::error(format!("Failed to run command: {}", e))
                    }
                    Err(_) => {
                        return ToolResult::error(format!(
                            "Command timed out after {} seconds",
                            self.timeout_secs
                        ))
                    }
                }
            }
        };

        let mut result = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&stderr);
        }

        if result.len() > MAX_OUTPUT_SIZE {
            result.truncate(MAX_OUTPUT_SIZE);
            result.push_str(&format!(
                "\n\n... (output truncated at {}KB)",
                MAX_OUTPUT_SIZE / 1024
            ));
        }
        if result.is_empty() {
            result = "(no output)".to_string();
        }

        if output.status.success() {
            ToolResult::text(result)
        } else {
            let code = output.status.code().unwrap_or(-1);
            ToolResult::error(format!("{}\n\nCommand exited with code {}", result, code))
        }
    }
}
