//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and loading
//! - [`validation`]: checks run after parsing
//! - [`defaults`]: serde default functions

mod defaults;
mod types;
mod validation;

pub use types::{CapabilityConfig, Config, ConfigError, LoggingConfig, SaslConfig};
pub use validation::{ValidationError, validate};
