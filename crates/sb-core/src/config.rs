//! Engine configuration
//!
//! Loaded from a JSON file; every field has a default, so an empty object
//! (or no file at all) is a valid configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::interceptor::DEFAULT_REDIRECT;
use crate::GROUPS_KEY;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Settings shared by the editor and the enforcement process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockerConfig {
    /// JSON file backing the persistent store
    pub store_path: PathBuf,
    /// Store key holding the group collection
    pub storage_key: String,
    /// Where blocked requests are sent
    pub redirect_to: String,
    /// How often the enforcement process checks the store for changes
    pub poll_interval_ms: u64,
}

impl Default for BlockerConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from("siteblock.json"),
            storage_key: GROUPS_KEY.to_string(),
            redirect_to: DEFAULT_REDIRECT.to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl BlockerConfig {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration JSON.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(ConfigError::Invalid("config must be a JSON object".to_string()));
        }
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_key.trim().is_empty() {
            return Err(ConfigError::Invalid("storage_key must not be empty".to_string()));
        }
        if self.redirect_to.trim().is_empty() {
            return Err(ConfigError::Invalid("redirect_to must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_object_is_default() {
        assert_eq!(BlockerConfig::from_json("{}").unwrap(), BlockerConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = BlockerConfig::from_json(r#"{"redirect_to": "chrome-extension://abc/blocked.html", "poll_interval_ms": 50}"#)
            .unwrap();
        assert_eq!(config.redirect_to, "chrome-extension://abc/blocked.html");
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.storage_key, "groups");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            BlockerConfig::from_json(r#"{"poll_interval_ms": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            BlockerConfig::from_json(r#"{"storage_key": " "}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(BlockerConfig::from_json("{"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            BlockerConfig::from_json(r#"{"poll_interval_ms": "fast"}"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_non_object_rejected() {
        for json in ["[]", "[\"groups.json\"]", "null", "42"] {
            assert!(
                matches!(BlockerConfig::from_json(json), Err(ConfigError::Invalid(_))),
                "accepted {json}"
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = BlockerConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"store_path": "/tmp/blocks.json"}"#).unwrap();
        let config = BlockerConfig::load(&path).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/blocks.json"));
    }
}
