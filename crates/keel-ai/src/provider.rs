//! Provider abstraction for chat completions

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    error::Result,
    models::Model,
    types::{ChatOptions, Context, Message, StopReason, Usage},
};

/// One completed model turn
#[derive(Debug, Clone)]
pub struct Completion {
    /// The assistant message produced by the model
    pub message: Message,
    /// Token usage for this turn
    pub usage: Usage,
    /// Why generation stopped
    pub stop_reason: StopReason,
}

/// Trait for chat completion backends
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Run one completion against the given context
    async fn complete(
        &self,
        model: &Model,
        context: &Context,
        options: &ChatOptions,
    ) -> Result<Completion>;
}

/// Retry configuration for provider calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Calculate delay for a given attempt (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_secs_f64(delay_secs.min(self.max_delay.as_secs_f64()))
    }
}
