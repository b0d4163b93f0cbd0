//! Chat session configuration.
//!
//! [`ChatConfig`] holds every runtime setting of a session.  It can be built
//! from defaults, or loaded from a TOML file where any missing key falls back
//! to its default:
//!
//! ```toml
//! retention_threshold = 200
//!
//! [rules]
//! show_kicks = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use soop_chat_core::retention::{VisibilityRules, DEFAULT_RETENTION_THRESHOLD};

/// Errors raised while building a session's configuration or endpoint.
///
/// These are reported softly: a session that cannot be configured is
/// "unavailable", it never fails with a protocol error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The live-info record lacks a field required to reach the chat server.
    #[error("chat endpoint field {0} is missing")]
    MissingField(&'static str),

    /// The chat port is not a valid TCP port.
    #[error("invalid chat port: {0:?}")]
    InvalidPort(String),

    /// The configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for [`ChatConfig`].
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// All runtime configuration for a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Maximum number of events kept in the history.
    pub retention_threshold: usize,

    /// Which event categories are kept in the history.
    pub rules: VisibilityRules,

    /// Period of the keepalive frame, in milliseconds.
    pub keepalive_interval_ms: u64,

    /// Period of the history pruning pass, in milliseconds.
    pub prune_interval_ms: u64,
}

impl Default for ChatConfig {
    /// | Field                 | Default   |
    /// |-----------------------|-----------|
    /// | retention_threshold   | 100       |
    /// | rules                 | all `true`|
    /// | keepalive_interval_ms | 30 000    |
    /// | prune_interval_ms     | 1 000     |
    fn default() -> Self {
        Self {
            retention_threshold: DEFAULT_RETENTION_THRESHOLD,
            rules: VisibilityRules::default(),
            keepalive_interval_ms: 30_000,
            prune_interval_ms: 1_000,
        }
    }
}

impl ChatConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not valid TOML or a key has
    /// the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Toml`] if it cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms.max(1))
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_millis(self.prune_interval_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let cfg = ChatConfig::default();
        assert_eq!(cfg.keepalive_interval(), Duration::from_secs(30));
        assert_eq!(cfg.prune_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_default_threshold_is_100() {
        assert_eq!(ChatConfig::default().retention_threshold, 100);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        // Arrange
        let text = r#"
            retention_threshold = 20

            [rules]
            show_kicks = false
        "#;

        // Act
        let cfg = ChatConfig::from_toml_str(text).unwrap();

        // Assert
        assert_eq!(cfg.retention_threshold, 20);
        assert!(!cfg.rules.show_kicks);
        assert!(cfg.rules.show_subscriptions);
        assert_eq!(cfg.keepalive_interval_ms, 30_000);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(ChatConfig::from_toml_str("").unwrap(), ChatConfig::default());
    }

    #[test]
    fn test_wrong_type_is_an_error() {
        let result = ChatConfig::from_toml_str("retention_threshold = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = ChatConfig::load(Path::new("/definitely/not/here.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let cfg = ChatConfig {
            prune_interval_ms: 0,
            ..ChatConfig::default()
        };
        assert_eq!(cfg.prune_interval(), Duration::from_millis(1));
    }
}
