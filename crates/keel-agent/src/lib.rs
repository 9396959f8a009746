//! keel-agent: Agent runtime
//!
//! One parameterized agent type drives the tool-use loop for all four
//! task profiles (code, plan, search, ask). The crate also provides the
//! intent classifier, the clarification protocol agents use to pause a
//! turn and ask the user a question, and the running-summary context
//! compressor.

pub mod agent;
pub mod clarify;
pub mod classifier;
pub mod compressor;
pub mod tool;

pub use agent::{AgentOutcome, AgentProfile, TaskAgent, DEFAULT_MAX_LOOP_TURNS};
pub use classifier::{IntentClassifier, TaskType};
pub use compressor::ContextCompressor;
pub use tool::{BoxedTool, Tool, ToolResult};
