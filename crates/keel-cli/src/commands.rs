//! REPL slash commands

use keel_agent::TaskType;

/// A parsed line of REPL input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    /// A normal message, with an optional forced task type
    Message {
        text: String,
        task_override: TaskType,
    },
    /// Build or rebuild the code index
    Index,
    /// Start a fresh conversation thread
    New,
    /// Show help text
    Help,
    /// Exit the session
    Quit,
    /// Unrecognized slash command
    Unknown(String),
}

/// Parse one line of user input.
///
/// `/code`, `/plan`, `/search`, and `/ask` force a task type for the
/// rest of the line, bypassing the classifier.
pub fn parse(line: &str) -> ReplInput {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return ReplInput::Message {
            text: line.to_string(),
            task_override: TaskType::Auto,
        };
    };

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((c, a)) => (c, a.trim()),
        None => (rest, ""),
    };

    match command {
        "code" | "plan" | "search" | "ask" => {
            // The four forced-task commands share their names with
            // TaskType labels.
            let task = TaskType::parse(command).unwrap_or(TaskType::Auto);
            ReplInput::Message {
                text: args.to_string(),
                task_override: task,
            }
        }
        "index" => ReplInput::Index,
        "new" => ReplInput::New,
        "help" => ReplInput::Help,
        "quit" | "exit" => ReplInput::Quit,
        other => ReplInput::Unknown(other.to_string()),
    }
}

pub const HELP_TEXT: &str = "\
Commands:
  /code <request>    force the code agent
  /plan <request>    force the planning agent
  /search <request>  force the search agent
  /ask <request>     force the Q&A agent
  /index             build the code index for this directory
  /new               start a fresh conversation
  /help              show this help
  /quit              exit

Anything else is classified automatically and routed to an agent.";
