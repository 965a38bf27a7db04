//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    /// Message queue sizes
    #[serde(default)]
    pub queues: QueueConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,

    /// Runtime settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Capacities of the bounded queues between the runtime and the controller
#[derive(Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Capacity of each message/response queue
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Capacity of the text input buffer
    #[serde(default = "default_max_input_text")]
    pub max_input_text: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_input_text: default_max_input_text(),
        }
    }
}

fn default_max_messages() -> usize {
    2048
}
fn default_max_input_text() -> usize {
    1024
}

/// Timeout settings in seconds
#[derive(Debug, Serialize, Deserialize)]
pub struct Timeouts {
    /// Timeout for pushing a message into a queue
    #[serde(default = "default_push_msg")]
    pub push_msg_secs: u64,

    /// Timeout for popping a message from a queue
    #[serde(default = "default_pop_msg")]
    pub pop_msg_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            push_msg_secs: default_push_msg(),
            pop_msg_secs: default_pop_msg(),
        }
    }
}

fn default_push_msg() -> u64 {
    3
}
fn default_pop_msg() -> u64 {
    3
}

impl Timeouts {
    pub fn push(&self) -> Duration {
        Duration::from_secs(self.push_msg_secs)
    }

    pub fn pop(&self) -> Duration {
        Duration::from_secs(self.pop_msg_secs)
    }
}

/// Runtime configuration
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Whether text output is forwarded before a controller connects
    #[serde(default)]
    pub text_output_enabled: bool,
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    super::Error::FileRead {
                        path: path.display().to_string(),
                        error: e.to_string(),
                    }
                })?;
                return Self::from_toml_str(&content);
            }
        }
        Ok(Self::default())
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| super::Error::Config(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.queues.max_messages == 0 {
            return Err(super::Error::Config(
                "queues.max_messages must be greater than 0".to_string(),
            ));
        }
        if self.queues.max_input_text == 0 {
            return Err(super::Error::Config(
                "queues.max_input_text must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.queues.max_messages, 2048);
        assert_eq!(config.queues.max_input_text, 1024);
        assert_eq!(config.timeouts.push(), Duration::from_secs(3));
        assert!(!config.runtime.text_output_enabled);
    }

    #[test]
    fn test_partial_override() {
        let config = Config::from_toml_str(
            r#"
            [timeouts]
            pop_msg_secs = 1

            [runtime]
            text_output_enabled = true
            "#,
        )
        .unwrap();
        assert_eq!(config.timeouts.pop(), Duration::from_secs(1));
        assert_eq!(config.timeouts.push_msg_secs, 3);
        assert!(config.runtime.text_output_enabled);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = Config::from_toml_str("[queues]\nmax_messages = 0\n").unwrap_err();
        assert!(matches!(err, super::super::Error::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[queues\nmax_messages = ").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(matches!(
            Config::from_toml_str(&content),
            Err(super::super::Error::ConfigParse(_))
        ));
    }

    #[test]
    fn test_effective_config_renders_as_toml() {
        let config = Config::from_toml_str("[runtime]\ntext_output_enabled = true").unwrap();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("text_output_enabled = true"));
        assert!(rendered.contains("max_messages = 2048"));
    }
}
