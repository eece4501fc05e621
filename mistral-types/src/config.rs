//! Configuration for clients and chat controllers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "MISTRAL_BASE_URL";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";

/// Default cap on retained history messages.
pub const DEFAULT_MAX_HISTORY_MESSAGES: usize = 50;

/// Default number of messages kept when history is trimmed.
pub const DEFAULT_HISTORY_TRIM_COUNT: usize = 30;

/// Explicit configuration value passed into clients and controllers.
///
/// Missing fields take their defaults when deserialised, so a partial
/// settings file is valid.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// API key sent as a bearer token.
    pub api_key: Option<String>,
    /// Base URL of the completion endpoint.
    pub base_url: String,
    /// Maximum messages kept in history; `0` means unlimited.
    pub max_history_messages: usize,
    /// Messages kept after a trim. Clamped to `max_history_messages`.
    pub history_trim_count: usize,
    /// Sampling temperature for requests built by the controller.
    pub temperature: f32,
    /// Token limit for requests built by the controller.
    pub max_tokens: u32,
    /// Nucleus sampling parameter for requests built by the controller.
    pub top_p: f32,
    /// Whether requests ask for the provider safety prompt.
    pub safe_prompt: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.into(),
            max_history_messages: DEFAULT_MAX_HISTORY_MESSAGES,
            history_trim_count: DEFAULT_HISTORY_TRIM_COUNT,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
            safe_prompt: false,
        }
    }
}

impl ChatConfig {
    /// Defaults, with the API key and base URL taken from the environment
    /// (`MISTRAL_API_KEY`, `MISTRAL_BASE_URL`) when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.api_key = Some(key);
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV)
            && !url.trim().is_empty()
        {
            config.base_url = url;
        }
        config
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the history cap and the size history is trimmed down to.
    #[must_use]
    pub fn with_history_limits(mut self, max_messages: usize, trim_to: usize) -> Self {
        self.max_history_messages = max_messages;
        self.history_trim_count = trim_to;
        self
    }

    /// The configured API key, or `None` if unset or blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("max_history_messages", &self.max_history_messages)
            .field("history_trim_count", &self.history_trim_count)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("top_p", &self.top_p)
            .field("safe_prompt", &self.safe_prompt)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ChatConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_history_messages, 50);
        assert_eq!(config.history_trim_count, 30);
        assert!(config.api_key().is_none());
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let config = ChatConfig::default().with_api_key("   ");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn api_key_is_trimmed() {
        let config = ChatConfig::default().with_api_key(" sk-test\n");
        assert_eq!(config.api_key(), Some("sk-test"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = ChatConfig::default().with_api_key("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn partial_settings_fill_in_defaults() {
        let config: ChatConfig =
            serde_json::from_str(r#"{"api_key":"k","max_history_messages":4}"#).unwrap();
        assert_eq!(config.api_key(), Some("k"));
        assert_eq!(config.max_history_messages, 4);
        assert_eq!(config.history_trim_count, DEFAULT_HISTORY_TRIM_COUNT);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
