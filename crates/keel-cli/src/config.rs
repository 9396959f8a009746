//! Configuration file support
//!
//! Two layers merge over built-in defaults: a global file at
//! `~/.config/keel/config.toml` (or `$KEEL_CONFIG_PATH`), then a
//! project-local `.keel.toml` in the working directory. Later layers
//! win key by key; tables merge recursively.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for keel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelsConfig,
    pub safety: SafetyConfig,
    pub index: IndexConfig,
    pub history: HistoryConfig,
    pub api_keys: ApiKeys,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            models: ModelsConfig::default(),
            safety: SafetyConfig::default(),
            index: IndexConfig::default(),
            history: HistoryConfig::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

/// Model selection per tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Model for code editing and planning
    pub capable: String,
    /// Model for classification, search, and general Q&A
    pub fast: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            capable: keel_ai::DEFAULT_CAPABLE_MODEL.to_string(),
            fast: keel_ai::DEFAULT_FAST_MODEL.to_string(),
        }
    }
}

/// Guard rails for tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Programs the shell tool may run
    pub allowed_commands: Vec<String>,
    /// Default timeout for shell and git subprocesses
    pub command_timeout_secs: u64,
    /// Whether the write tool is confined to the working directory
    pub confine_writes: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            allowed_commands: [
                "ls", "cat", "head", "tail", "wc", "grep", "find", "git", "cargo", "rustc",
                "python", "python3", "echo",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            command_timeout_secs: 30,
            confine_writes: true,
        }
    }
}

/// Code index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Glob patterns for files to index, relative to the working directory
    pub include: Vec<String>,
    /// Files larger than this are skipped
    pub max_file_size: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            include: [
                "**/*.rs", "**/*.py", "**/*.js", "**/*.ts", "**/*.go", "**/*.toml", "**/*.md",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            max_file_size: 512 * 1024,
        }
    }
}

/// Interaction log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Override for the log directory; defaults to the platform data dir
    pub dir: Option<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

/// API key configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub anthropic: Option<String>,
}

impl Config {
    /// Get the global config file path
    pub fn global_config_path() -> PathBuf {
        if let Ok(path) = std::env::var("KEEL_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keel")
            .join("config.toml")
    }

    /// Load the merged configuration for a working directory
    pub fn load(working_dir: &Path) -> Self {
        let mut layers = vec![];
        layers.push(Self::global_config_path());
        layers.push(working_dir.join(".keel.toml"));

        let mut merged = toml::Value::Table(Default::default());
        for path in layers {
            if !path.exists() {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(content) => match content.parse::<toml::Value>() {
                    Ok(value) => merge_value(&mut merged, value),
                    Err(e) => {
                        eprintln!("Warning: Failed to parse {}: {}", path.display(), e)
                    }
                },
                Err(e) => eprintln!("Warning: Failed to read {}: {}", path.display(), e),
            }
        }

        match merged.try_into() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Get the Anthropic API key, config first, then environment
    pub fn anthropic_api_key(&self) -> Option<String> {
        self.api_keys
            .anthropic
            .clone()
            .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok())
    }

    /// Directory for interaction logs
    pub fn history_dir(&self) -> PathBuf {
        match &self.history.dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("keel")
                .join("history"),
        }
    }
}

/// Recursively merge `overlay` into `base`. Tables merge key by key;
/// everything else is replaced.
fn merge_value(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_value(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (base_slot, overlay) => *base_slot = overlay,
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# keel configuration file
# Global: ~/.config/keel/config.toml
# Per-project: .keel.toml in the project root (overrides global)

[models]
# capable = "claude-sonnet-4-5-20250929"
# fast = "claude-haiku-4-5-20251001"

[safety]
# allowed_commands = ["ls", "cat", "grep", "git", "cargo"]
# command_timeout_secs = 30
# confine_writes = true

[index]
# include = ["**/*.rs", "**/*.md"]
# max_file_size = 524288

[history]
# enabled = true
# dir = "~/.local/share/keel/history"

# It's recommended to use the ANTHROPIC_API_KEY environment variable
# instead for security
[api_keys]
# anthropic = "sk-ant-..."
"#
}
