//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::defaults::{
    default_cap_version, default_hangup_message, default_log_filter, default_requested_caps,
    default_sasl_mechanisms, default_true,
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capability negotiation.
    pub capabilities: CapabilityConfig,
    /// SASL authentication.
    pub sasl: SaslConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// `[capabilities]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CapabilityConfig {
    /// Capabilities requested whenever the server offers them.
    pub request: Vec<String>,
    /// Version sent with `CAP LS`.
    pub version: u16,
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            request: default_requested_caps(),
            version: default_cap_version(),
        }
    }
}

/// `[sasl]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaslConfig {
    /// Contribute the `sasl` capability and authenticate when it is acked.
    pub enabled: bool,
    /// Mechanisms to try, in order.
    pub mechanisms: Vec<String>,
    /// QUIT reason sent when every mechanism failed.
    pub hangup_message: String,
}

impl Default for SaslConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            mechanisms: default_sasl_mechanisms(),
            hangup_message: default_hangup_message(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence when set.
    pub filter: String,
    /// Emit JSON lines instead of human-readable text.
    pub json: bool,
    /// Include the event target in each record.
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
            target: default_true(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.capabilities.version, 302);
        assert!(config.capabilities.request.contains(&"cap-notify".to_string()));
        assert!(config.sasl.enabled);
        assert_eq!(config.sasl.mechanisms, ["EXTERNAL", "SCRAM-SHA-256", "PLAIN"]);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml(
            r#"
[sasl]
mechanisms = ["PLAIN"]

[logging]
json = true
"#,
        )
        .unwrap();
        assert_eq!(config.sasl.mechanisms, ["PLAIN"]);
        assert_eq!(config.sasl.hangup_message, "SASL authentication failed");
        assert!(config.logging.json);
        assert!(config.logging.target);
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[capabilities]\nrequest = [\"away-notify\"]").unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.capabilities.request, ["away-notify"]);
    }

    #[test]
    fn load_reports_io_and_parse_errors() {
        assert!(matches!(
            Config::load("/nonexistent/slirc-client.toml"),
            Err(ConfigError::Io(_))
        ));
        assert!(matches!(
            Config::from_toml("[sasl]\nenabled = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
