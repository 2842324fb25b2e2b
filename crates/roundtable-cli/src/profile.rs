//! TOML run profiles.
//!
//! A profile captures the run parameters a user would otherwise repeat as
//! flags: provider, model, endpoint, and the default termination bounds.
//! Flags always override profile values.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Run parameters loadable from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Completion provider: `openai` or `anthropic`.
    pub provider: String,

    /// Model identifier.
    pub model: String,

    /// Base URL override for OpenAI-compatible endpoints (e.g. Ollama).
    pub base_url: Option<String>,

    /// Step budget per conversation.
    pub max_steps: usize,

    /// Message budget fed into the termination condition.
    pub max_messages: usize,

    /// Token whose mention ends a conversation.
    pub mention: String,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o-mini".into(),
            base_url: None,
            max_steps: 25,
            max_messages: 10,
            mention: "TERMINATE".into(),
        }
    }
}

impl Profile {
    /// Load a profile from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("failed to parse profile {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_classic_termination() {
        let profile = Profile::default();
        assert_eq!(profile.max_messages, 10);
        assert_eq!(profile.mention, "TERMINATE");
        assert_eq!(profile.provider, "openai");
    }

    #[test]
    fn loads_partial_profile_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "model = \"llama3.2:latest\"\nbase_url = \"http://localhost:11434/v1\"\nmax_messages = 20"
        )
        .expect("write profile");

        let profile = Profile::load(file.path()).expect("load profile");
        assert_eq!(profile.model, "llama3.2:latest");
        assert_eq!(profile.base_url.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(profile.max_messages, 20);
        // Unset keys fall back to defaults.
        assert_eq!(profile.mention, "TERMINATE");
        assert_eq!(profile.max_steps, 25);
    }

    #[test]
    fn malformed_profile_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "max_messages = \"not a number\"").expect("write profile");
        assert!(Profile::load(file.path()).is_err());
    }
}
