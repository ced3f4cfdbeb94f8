//! SASL authentication over `AUTHENTICATE`.
//!
//! [`SaslAuthenticator`] is a [`Handler`](crate::Handler) that takes over
//! when the server acknowledges the `sasl` capability. It holds the `CAP ACK`
//! back from later handlers until authentication ends, tries the configured
//! mechanisms in order and hangs up when none of them works.
//!
//! # Supported Mechanisms
//!
//! - **EXTERNAL**: TLS client certificate
//! - **SCRAM-SHA-256**: challenge-response (RFC 7677)
//! - **PLAIN**: username/password (RFC 4616)
//!
//! Other mechanisms plug in through [`MechanismProvider`].

mod authenticator;
mod chunk;
mod external;
mod mechanism;
mod plain;
mod scram;

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

pub use authenticator::SaslAuthenticator;
pub use chunk::{ChallengeBuffer, SASL_CHUNK_SIZE, chunk_response};
pub use external::ExternalMechanism;
pub use mechanism::{Mechanism, MechanismError, MechanismProvider};
pub use plain::{PlainMechanism, encode_plain};
pub use scram::{ScramError, ScramSha256};

/// Authentication progress for the current connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthState {
    /// Waiting for the server to acknowledge `sasl`.
    #[default]
    Query,
    /// A mechanism is running.
    Requested,
    /// Authenticated.
    Done,
    /// Every mechanism failed; the connection is being hung up.
    Unavailable,
}

/// Login material for one mechanism.
#[derive(Clone, Zeroize)]
pub struct Credentials {
    /// Identity to act as, when different from `authcid`.
    pub authzid: Option<String>,
    /// Identity whose secret is presented.
    pub authcid: String,
    secret: Zeroizing<String>,
}

impl Credentials {
    pub fn new(authcid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            authzid: None,
            authcid: authcid.into(),
            secret: Zeroizing::new(secret.into()),
        }
    }

    pub fn with_authzid(mut self, authzid: impl Into<String>) -> Self {
        self.authzid = Some(authzid.into());
        self
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("authzid", &self.authzid)
            .field("authcid", &self.authcid)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Caller-supplied credential lookup, keyed by mechanism name.
pub trait CredentialSource: Send + Sync {
    fn lookup(&self, mechanism: &str) -> Option<Credentials>;
}

impl<F> CredentialSource for F
where
    F: Fn(&str) -> Option<Credentials> + Send + Sync,
{
    fn lookup(&self, mechanism: &str) -> Option<Credentials> {
        self(mechanism)
    }
}

/// Built-in mechanisms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MechanismKind {
    External,
    ScramSha256,
    Plain,
}

impl MechanismKind {
    /// Parse a mechanism name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "EXTERNAL" => Some(Self::External),
            "SCRAM-SHA-256" => Some(Self::ScramSha256),
            "PLAIN" => Some(Self::Plain),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::External => "EXTERNAL",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::Plain => "PLAIN",
        }
    }
}

impl fmt::Display for MechanismKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MechanismProvider for MechanismKind {
    fn name(&self) -> &str {
        self.as_str()
    }

    fn create(&self, credentials: Credentials) -> Box<dyn Mechanism> {
        match self {
            Self::External => Box::new(ExternalMechanism::new(credentials)),
            Self::ScramSha256 => Box::new(ScramSha256::new(credentials)),
            Self::Plain => Box::new(PlainMechanism::new(credentials)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mechanism_names() {
        assert_eq!(MechanismKind::from_name("plain"), Some(MechanismKind::Plain));
        assert_eq!(
            MechanismKind::from_name("SCRAM-SHA-256"),
            Some(MechanismKind::ScramSha256)
        );
        assert_eq!(MechanismKind::from_name("DIGEST-MD5"), None);
        assert_eq!(MechanismKind::External.to_string(), "EXTERNAL");
        assert_eq!(MechanismKind::Plain.create(Credentials::new("a", "b")).name(), "PLAIN");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("bot", "hunter2");
        let shown = format!("{creds:?}");
        assert!(shown.contains("bot"));
        assert!(!shown.contains("hunter2"));
    }
}
