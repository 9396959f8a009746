//! Content search tool

use async_trait::async_trait;
use keel_agent::{Tool, ToolResult};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

const DEFAULT_LIMIT: usize = 50;
const MAX_LINE_LENGTH: usize = 500;

/// Tool for searching file contents with a regex
pub struct GrepTool {
    root: PathBuf,
}

impl GrepTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for a regex pattern in files. Returns matching lines with file paths \
         and line numbers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in (defaults to the working directory)"
                },
                "glob": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g. '**/*.rs')"
                },
                "case_insensitive": {
                    "type": "boolean",
                    "description": "Whether to ignore case (default: false)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of matches to return (default: 50)"
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
        let pattern_str = match arguments.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p,
            None => return ToolResult::error("Missing 'pattern' argument"),
        };
        let case_insensitive = arguments
            .get("case_insensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let regex_pattern = if case_insensitive {
            format!("(?i){}", pattern_str)
        } else {
            pattern_str.to_string()
        };
        let regex = match regex::Regex::new(&regex_pattern) {
            Ok(r) => r,
            Err(e) => return ToolResult::error(format!("Invalid regex pattern: {}", e)),
        };

        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .map(|p| super::resolve_path(&self.root, p))
            .unwrap_or_else(|| self.root.clone());
        let glob_pattern = arguments.get("glob").and_then(|v| v.as_str());
        let limit = arguments
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_LIMIT as u64) as usize;

        let files = collect_files(&path, glob_pattern);

        let mut matches = Vec::new();
        for file_path in files {
            if cancel.is_cancelled() {
                return ToolResult::error("Search cancelled");
            }
            search_file(&self.root, &file_path, &regex, limit, &mut matches);
            if matches.len() >= limit {
                break;
            }
        }

        if matches.is_empty() {
            return ToolResult::text("No matches found");
        }

        let truncated = matches.len() >= limit;
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n(showing first {} matches)", limit));
        }
        ToolResult::text(output)
    }
}

fn collect_files(path: &Path, glob_pattern: Option<&str>) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    let pattern = match glob_pattern {
        Some(g) => path.join(g).to_string_lossy().to_string(),
        None => path.join("**/*").to_string_lossy().to_string(),
    };

    let mut files = Vec::new();
    if let Ok(entries) = glob::glob(&pattern) {
        for entry in entries.flatten() {
            if !entry.is_file() {
                continue;
            }
            let path_str = entry.to_string_lossy();
            if path_str.contains("/.git/")
                || path_str.contains("/node_modules/")
                || path_str.contains("/target/")
            {
                continue;
            }
            files.push(entry);
        }
    }
    files
}

fn search_file(
    root: &Path,
    path: &Path,
    regex: &regex::Regex,
    limit: usize,
    matches: &mut Vec<String>,
) {
    // Binary files fail the UTF-8 read and are skipped.
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    let display = path.strip_prefix(root).unwrap_or(path).display();
    for (line_num, line) in content.lines().enumerate() {
        if matches.len() >= limit {
            return;
        }
        if regex.is_match(line) {
            matches.push(format!(
                "{}:{}: {}",
                display,
                line_num + 1,
                truncate_line(line)
            ));
        }
    }
}

fn truncate_line(line: &str) -> String {
    if line.len() > MAX_LINE_LENGTH {
        let cut: String = line.chars().take(MAX_LINE_LENGTH).collect();
        format!("{}...", cut)
    } else {
        line.to_string()
    }
}
