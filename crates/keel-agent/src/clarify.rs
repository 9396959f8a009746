//! Clarification protocol
//!
//! Agents have two ways to ask the user a question mid-task. The
//! preferred path is the structured `ask_user` tool call, which the
//! agent loop intercepts instead of executing. The legacy path is a
//! `[CLARIFY]...[/CLARIFY]` marker embedded in the final assistant
//! text; the marker scan is kept as a compatibility fallback because
//! models occasionally emit it unprompted.

use regex::Regex;
use std::sync::LazyLock;

/// Opening marker for an in-band clarification request
pub const OPEN_TAG: &str = "[CLARIFY]";
/// Closing marker for an in-band clarification request
pub const CLOSE_TAG: &str = "[/CLARIFY]";

/// Name of the structured clarification tool
pub const ASK_USER_TOOL: &str = "ask_user";

static WELL_FORMED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[CLARIFY\](.*?)\[/CLARIFY\]").unwrap());
static OPEN_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[CLARIFY\](.*)").unwrap());

/// Definition of the `ask_user` tool, surfaced to every agent.
///
/// The agent loop never executes this tool; it extracts the question
/// and suspends the turn.
pub fn ask_user_tool() -> keel_ai::Tool {
    keel_ai::Tool::new(
        ASK_USER_TOOL,
        "Ask the user a clarifying question when the task is ambiguous and you cannot \
         usefully continue without their input. Use at most once per task.",
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": {
                    "type": "string",
                    "description": "The question to put to the user"
                }
            },
            "required": ["question"]
        }),
    )
}

/// Scan text for a clarification marker. Returns the extracted question
/// if the marker is present.
pub fn find_marker(text: &str) -> Option<String> {
    if !text.contains(OPEN_TAG) {
        return None;
    }
    Some(extract_clarification(text))
}

/// Extract the question from `[CLARIFY]...[/CLARIFY]` tags.
///
/// If the closing tag is missing (truncated output), everything after
/// the opening tag is taken instead.
pub fn extract_clarification(text: &str) -> String {
    if let Some(captures) = WELL_FORMED.captures(text) {
        return captures[1].trim().to_string();
    }
    if let Some(captures) = OPEN_ONLY.captures(text) {
        return captures[1].trim().to_string();
    }
    text.trim().to_string()
}
