//! Append-only interaction log
//!
//! One JSONL file per session, named `YYYY-MM-DD-<session>.jsonl`.
//! Each line is a single timestamped event. Logging failures are never
//! fatal to the session; they degrade to a warning.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// A single logged event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HistoryEntry {
    /// Session started
    SessionStart {
        session_id: String,
        working_dir: String,
        timestamp: i64,
    },
    /// A user or assistant message
    Message {
        role: String,
        content: String,
        task_type: Option<String>,
        timestamp: i64,
    },
    /// A clarification question was raised
    Clarification { question: String, timestamp: i64 },
}

/// Writer for one session's interaction log
pub struct HistoryLog {
    #[allow(dead_code)]
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl HistoryLog {
    /// Open a new log file for a session. Returns a disabled logger if
    /// the directory cannot be created.
    pub fn new(dir: &Path, session_id: &str, working_dir: &str) -> Self {
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("{}-{}.jsonl", date, session_id));

        let writer = match fs::create_dir_all(dir).and_then(|_| File::create(&path)) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                tracing::warn!("history logging disabled: {}", e);
                None
            }
        };

        let mut log = Self { path, writer };
        log.append(HistoryEntry::SessionStart {
            session_id: session_id.to_string(),
            working_dir: working_dir.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
        log
    }

    /// Disabled logger that drops every entry
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            writer: None,
        }
    }

    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log a user or assistant message
    pub fn message(&mut self, role: &str, content: &str, task_type: Option<&str>) {
        self.append(HistoryEntry::Message {
            role: role.to_string(),
            content: content.to_string(),
            task_type: task_type.map(str::to_string),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    /// Log a raised clarification question
    pub fn clarification(&mut self, question: &str) {
        self.append(HistoryEntry::Clarification {
            question: question.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        });
    }

    fn append(&mut self, entry: HistoryEntry) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };
        match serde_json::to_string(&entry) {
            Ok(line) => {
                if writeln!(writer, "{}", line).and_then(|_| writer.flush()).is_err() {
                    tracing::warn!("history write failed, disabling log");
                    self.writer = None;
                }
            }
            Err(e) => tracing::warn!("failed to serialize history entry: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    fn read_entries(path: &Path) -> Vec<HistoryEntry> {
        let file = File::open(path).unwrap();
        std::io::BufReader::new(file)
            .lines()
            .map(|l| serde_json::from_str(&l.unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_log_records_session_and_messages() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = HistoryLog::new(dir.path(), "abc123", "/work");
        log.message("user", "hello", None);
        log.message("assistant", "hi there", Some("ask"));
        log.clarification("Which database?");

        let entries = read_entries(log.path());
        assert_eq!(entries.len(), 4);
        match &entries[0] {
            HistoryEntry::SessionStart { session_id, .. } => assert_eq!(session_id, "abc123"),
            other => panic!("expected session start, got {:?}", other),
        }
        match &entries[2] {
            HistoryEntry::Message { role, task_type, .. } => {
                assert_eq!(role, "assistant");
                assert_eq!(task_type.as_deref(), Some("ask"));
            }
            other => panic!("expected message, got {:?}", other),
        }
        match &entries[3] {
            HistoryEntry::Clarification { question, .. } => {
                assert_eq!(question, "Which database?")
            }
            other => panic!("expected clarification, got {:?}", other),
        }
    }

    #[test]
    fn test_file_name_carries_date_and_session() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path(), "s1", ".");
        let name = log.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("-s1.jsonl"), "got: {}", name);
    }

    #[test]
    fn test_disabled_log_drops_entries() {
        let mut log = HistoryLog::disabled();
        // Must not panic or create files.
        log.message("user", "hello", None);
    }
}
