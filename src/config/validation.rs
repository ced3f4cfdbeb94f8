//! Configuration validation.
//!
//! Catches settings the engine cannot honour before a connection starts.

use std::collections::HashSet;

use super::Config;
use crate::sasl::MechanismKind;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("capabilities.version must be 301 or 302, got {0}")]
    UnsupportedCapVersion(u16),
    #[error("sasl.mechanisms contains unknown mechanism '{0}'")]
    UnknownMechanism(String),
    #[error("sasl.mechanisms lists '{0}' more than once")]
    DuplicateMechanism(String),
    #[error("sasl.mechanisms must not be empty while sasl is enabled")]
    NoMechanisms,
    #[error("sasl.hangup_message must not be empty")]
    EmptyHangupMessage,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let version = config.capabilities.version;
    if !matches!(version, 301 | 302) {
        errors.push(ValidationError::UnsupportedCapVersion(version));
    }

    let sasl = &config.sasl;
    let mut seen = HashSet::new();
    for name in &sasl.mechanisms {
        if MechanismKind::from_name(name).is_none() {
            errors.push(ValidationError::UnknownMechanism(name.clone()));
        } else if !seen.insert(name.to_ascii_uppercase()) {
            errors.push(ValidationError::DuplicateMechanism(name.clone()));
        }
    }
    if sasl.enabled && sasl.mechanisms.is_empty() {
        errors.push(ValidationError::NoMechanisms);
    }
    if sasl.hangup_message.trim().is_empty() {
        errors.push(ValidationError::EmptyHangupMessage);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_all_errors_are_reported() {
        let toml = r#"
[capabilities]
version = 300

[sasl]
mechanisms = ["PLAIN", "DIGEST-MD5", "plain"]
hangup_message = "  "
"#;
        let config = Config::from_toml(toml).unwrap();
        let errors = validate(&config).unwrap_err();
        assert_eq!(
            errors,
            [
                ValidationError::UnsupportedCapVersion(300),
                ValidationError::UnknownMechanism("DIGEST-MD5".into()),
                ValidationError::DuplicateMechanism("plain".into()),
                ValidationError::EmptyHangupMessage,
            ]
        );
    }

    #[test]
    fn test_empty_mechanisms_only_matter_when_enabled() {
        let config = Config::from_toml("[sasl]\nenabled = false\nmechanisms = []").unwrap();
        assert!(validate(&config).is_ok());

        let config = Config::from_toml("[sasl]\nmechanisms = []").unwrap();
        let errors = validate(&config).unwrap_err();
        assert!(errors.iter().any(|e| matches!(e, ValidationError::NoMechanisms)));
    }
}
