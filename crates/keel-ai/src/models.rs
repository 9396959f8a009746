//! Model definitions and the two-tier selection keel uses.

use serde::{Deserialize, Serialize};

/// Default Anthropic API base URL
pub const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";

/// Default capable-tier model (code generation, planning)
pub const DEFAULT_CAPABLE_MODEL: &str = "claude-sonnet-4-5-20250929";

/// Default fast-tier model (routing, search, Q&A)
pub const DEFAULT_FAST_MODEL: &str = "claude-haiku-4-5-20251001";

/// Which class of model an agent is bound to.
///
/// Classification, search, and general Q&A run on the fast tier; code
/// editing and planning run on the capable tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Capable,
}

/// Model definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "claude-sonnet-4-5-20250929")
    pub id: String,
    /// Base URL for API calls
    pub base_url: String,
    /// Maximum output tokens
    pub max_tokens: u32,
}

impl Model {
    /// Create a model pointing at the Anthropic API
    pub fn anthropic(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base_url: ANTHROPIC_BASE_URL.to_string(),
            max_tokens: 8192,
        }
    }

    /// Default model for a tier
    pub fn for_tier(tier: ModelTier) -> Self {
        match tier {
            ModelTier::Fast => Self::anthropic(DEFAULT_FAST_MODEL),
            ModelTier::Capable => Self::anthropic(DEFAULT_CAPABLE_MODEL),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_defaults() {
        assert_eq!(Model::for_tier(ModelTier::Fast).id, DEFAULT_FAST_MODEL);
        assert_eq!(Model::for_tier(ModelTier::Capable).id, DEFAULT_CAPABLE_MODEL);
    }

    #[test]
    fn test_anthropic_base_url() {
        let m = Model::anthropic("some-model");
        assert_eq!(m.base_url, ANTHROPIC_BASE_URL);
    }
}
