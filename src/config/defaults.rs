//! Default value functions for configuration.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Capability Defaults
// =============================================================================

pub fn default_cap_version() -> u16 {
    302
}

pub fn default_requested_caps() -> Vec<String> {
    ["cap-notify", "multi-prefix", "server-time"]
        .into_iter()
        .map(String::from)
        .collect()
}

// =============================================================================
// SASL Defaults
// =============================================================================

/// Mechanism preference order, strongest first.
pub fn default_sasl_mechanisms() -> Vec<String> {
    ["EXTERNAL", "SCRAM-SHA-256", "PLAIN"]
        .into_iter()
        .map(String::from)
        .collect()
}

pub fn default_hangup_message() -> String {
    "SASL authentication failed".to_string()
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_filter() -> String {
    "info".to_string()
}
