//! keel-ai: LLM provider layer
//!
//! This crate provides the message/tool types shared across keel and a
//! non-streaming client for the Anthropic Messages API, including the
//! tool-use protocol the agent runtime drives.

pub mod anthropic;
pub mod error;
pub mod models;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use error::{Error, Result};
pub use models::{DEFAULT_CAPABLE_MODEL, DEFAULT_FAST_MODEL, Model, ModelTier};
pub use provider::{ChatProvider, Completion, RetryConfig};
pub use types::*;
