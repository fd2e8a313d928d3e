//! Model settings and credential lookup.

use std::path::PathBuf;

use crate::{ConfigError, Result};

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default completion budget per model call.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default number of model calls allowed for one user query.
pub const DEFAULT_MAX_TURNS: u32 = 10;

/// Environment variable holding the Anthropic API key.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Application name for platform directory resolution.
const APP_NAME: &str = "conduit";

/// How the agent talks to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Model identifier sent with every request.
    pub model: String,
    /// Maximum tokens per model call.
    pub max_tokens: u32,
    /// Maximum model calls per user query.
    pub max_turns: u32,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            max_turns: DEFAULT_MAX_TURNS,
            system_prompt: None,
        }
    }
}

impl ModelSettings {
    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-call token budget.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the per-query model call limit.
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    /// Set the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Read the Anthropic API key from the process environment.
pub fn resolve_api_key() -> Result<String> {
    resolve_api_key_with(|name| std::env::var(name).ok())
}

/// Read the Anthropic API key through a custom lookup. Blank values count
/// as missing.
pub fn resolve_api_key_with<F>(lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(API_KEY_ENV)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ConfigError::ApiKeyNotFound {
            env_var: API_KEY_ENV.to_string(),
        })
}

/// Platform data directory for conduit (`~/.local/share/conduit` on Linux).
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    data_dir().map(|d| d.join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_settings_defaults() {
        let settings = ModelSettings::default();
        assert_eq!(settings.model, "claude-3-5-sonnet-20241022");
        assert_eq!(settings.max_tokens, 1000);
        assert_eq!(settings.max_turns, 10);
        assert!(settings.system_prompt.is_none());
    }

    #[test]
    fn test_model_settings_builders() {
        let settings = ModelSettings::default()
            .with_model("claude-3-haiku")
            .with_max_tokens(256)
            .with_max_turns(3)
            .with_system_prompt("Be brief.");
        assert_eq!(settings.model, "claude-3-haiku");
        assert_eq!(settings.max_tokens, 256);
        assert_eq!(settings.max_turns, 3);
        assert_eq!(settings.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn test_resolve_api_key() {
        let key = resolve_api_key_with(|name| {
            (name == API_KEY_ENV).then(|| " sk-ant-test \n".to_string())
        })
        .unwrap();
        assert_eq!(key, "sk-ant-test");
    }

    #[test]
    fn test_resolve_api_key_missing_or_blank() {
        for value in [None, Some(String::new()), Some("   ".to_string())] {
            let err = resolve_api_key_with(|_| value.clone()).unwrap_err();
            assert!(matches!(err, ConfigError::ApiKeyNotFound { ref env_var } if env_var == API_KEY_ENV));
        }
    }

    #[test]
    fn test_log_dir_is_under_data_dir() {
        if let (Some(data), Some(logs)) = (data_dir(), log_dir()) {
            assert!(logs.starts_with(&data));
            assert!(logs.ends_with("conduit/logs"));
        }
    }
}
