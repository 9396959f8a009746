//! File writing tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::path::PathBuf;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Tool for writing file contents.
///
/// When confined, refuses any path that resolves outside the working
/// directory.
pub struct WriteTool {
    root: PathBuf,
    confined: bool,
}

impl WriteTool {
    pub fn new(root: PathBuf, confined: bool) -> Self {
        Self { root, confined }
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "write"
    }

    fn description(&self) -> &str {
        "Write content to a file inside the working directory. Creates the file if it \
         doesn't exist, overwrites if it does. Creates parent directories as needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path to the file, relative to the working directory"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
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
        let content = match arguments.get("content").and_then(|v| v.as_str()) {
            Some(c) => c,
            None => return ToolResult::error("Missing 'content' argument"),
        };

        let path = super::resolve_path(&self.root, path_str);
        if self.confined && !super::is_confined(&self.root, &path) {
            return ToolResult::error(format!(
                "Refusing to write outside the working directory: {}",
                path_str
            ));
        }

        if cancel.is_cancelled() {
            return ToolResult::error("Operation cancelled");
        }

        if let Some(parent) = path.parent() {
            if !parent.exists() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    return ToolResult::error(format!("Failed to create directory: {}", e));
                }
            }
        }

        match fs::write(&path, content).await {
            Ok(()) => ToolResult::text(format!(
                "Successfully wrote {} bytes to {}",
                content.len(),
                path_str
            )),
            Err(e) => ToolResult::error(format!("Failed to write file: {}", e)),
        }
    }
}
