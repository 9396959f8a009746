//! Directory listing tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const DEFAULT_LIMIT: usize = 100;

/// Tool for listing directory contents
pub struct ListTool {
    root: PathBuf,
}

impl ListTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListTool {
    fn name(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List the contents of a directory. Directories are suffixed with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (defaults to the working directory)"
                },
                "recursive": {
                    "type": "boolean",
                    "description": "Whether to list recursively (default: false)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of entries to return (default: 100)"
                }
            },
            "required": []
        })
    }

    async fn execute(
        &self,
        _tool_call_id: &str,
        arguments: serde_json::Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .map(|p| super::resolve_path(&self.root, p))
            .unwrap_or_else(|| self.root.clone());

        let recursive = arguments
            .get("recursive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64) as usize;

        if !path.is_dir() {
            return ToolResult::error(format!("Not a directory: {}", path.display()));
        }

        let mut entries = Vec::new();
        collect(&path, &path, recursive, &cancel, &mut entries, limit);

        if cancel.is_cancelled() {
            return ToolResult::error("List cancelled");
        }
        if entries.is_empty() {
            return ToolResult::text("(empty directory)");
        }

        let truncated = entries.len() >= limit;
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n(showing first {} entries)", limit));
        }
        ToolResult::text(output)
    }
}

fn collect(
    base: &Path,
    path: &Path,
    recursive: bool,
    cancel: &CancellationToken,
    entries: &mut Vec<String>,
    limit: usize,
) {
    let Ok(read_dir) = fs::read_dir(path) else {
        return;
    };

    let mut items: Vec<_> = read_dir.flatten().collect();
    items.sort_by_key(|e| e.path());

    for entry in items {
        if cancel.is_cancelled() || entries.len() >= limit {
            return;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == "node_modules" || name == "target" {
            continue;
        }

        let full_path = entry.path();
        let display = full_path
            .strip_prefix(base)
            .unwrap_or(&full_path)
            .to_string_lossy()
            .to_string();

        if full_path.is_dir() {
            entries.push(format!("{}/", display));
            if recursive {
                collect(base, &full_path, recursive, cancel, entries, limit);
            }
        } else {
            entries.push(display);
        }
    }
}
