//! Assistant configuration with documented constants
//!
//! All tuning knobs are collected here with explanations of their purpose
//! and how they interact with each other.

use crate::core::error::{DraftError, Result};
use serde::Deserialize;

/// Configuration for the resolution pipeline
///
/// These values have been tuned for responsive turn handling against
/// long documents. Changing them affects prompt size and confirmation flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    // === PROMPT ASSEMBLY ===
    /// Maximum number of outline sections included in a prompt
    ///
    /// Long documents can have hundreds of sections; beyond this count the
    /// outline is truncated with a trailing marker. Larger values improve
    /// target disambiguation at the cost of prompt tokens.
    pub max_outline_sections: usize,

    /// Maximum number of focused-section paragraphs included in a prompt
    ///
    /// Only the focused section's own paragraphs are serialized; the
    /// subtree is summarized by count.
    pub max_context_paragraphs: usize,

    /// Maximum character length of a single paragraph in the prompt
    ///
    /// Paragraphs longer than this are cut at a char boundary with an
    /// ellipsis. Protects prompt size against pasted walls of text.
    pub max_paragraph_chars: usize,

    // === BEHAVIOR SUMMARY ===
    /// Number of recent applied edits described in the behavior summary
    ///
    /// The summary helps the model resolve follow-ups ("make it shorter").
    /// Kept short: each entry is one line.
    pub max_behavior_events: usize,

    // === EXECUTION ===
    /// Maximum clarify round-trips for a single step
    ///
    /// A primitive that keeps asking for clarification is cut off after
    /// this many resolutions; the step then fails instead of looping.
    pub max_clarify_depth: u32,

    /// Maximum steps allowed in one compound command
    ///
    /// Rule-matched compound phrasing (rewrite + highlight + summary)
    /// never produces more than this many primitive steps.
    pub max_compound_steps: usize,

    // === SESSION ===
    /// Milliseconds after which a last-edit context stops driving follow-ups
    ///
    /// "Make it shorter" an hour later is more likely a new request than a
    /// refinement of the morning's edit. 10 minutes by default.
    pub follow_up_window_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_outline_sections: 40,
            max_context_paragraphs: 12,
            max_paragraph_chars: 600,
            max_behavior_events: 3,
            max_clarify_depth: 3,
            max_compound_steps: 4,
            follow_up_window_ms: 10 * 60 * 1000,
        }
    }
}

impl AssistantConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| DraftError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.max_clarify_depth == 0 {
            return Err(DraftError::ConfigError(
                "max_clarify_depth must be at least 1".into(),
            ));
        }
        if self.max_compound_steps == 0 {
            return Err(DraftError::ConfigError(
                "max_compound_steps must be at least 1".into(),
            ));
        }
        if self.max_outline_sections == 0 || self.max_context_paragraphs == 0 {
            return Err(DraftError::ConfigError(
                "prompt limits must be positive".into(),
            ));
        }
        Ok(())
    }
}
