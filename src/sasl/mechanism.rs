//! Pluggable mechanism interface.

use thiserror::Error;
use zeroize::Zeroizing;

use super::Credentials;
use super::scram::ScramError;

/// One authentication mechanism instance, scoped to a single attempt.
///
/// The authenticator calls [`begin`](Self::begin) once, then
/// [`evaluate_challenge`](Self::evaluate_challenge) for every decoded server
/// challenge (the first one is usually empty), and always
/// [`dispose`](Self::dispose) when the attempt ends, whatever the outcome.
pub trait Mechanism: Send {
    /// IANA mechanism name, e.g. `PLAIN`.
    fn name(&self) -> &'static str;

    fn begin(&mut self) -> Result<(), MechanismError>;

    /// Produce the response to one challenge. An empty response is sent as
    /// `AUTHENTICATE +`.
    fn evaluate_challenge(&mut self, challenge: &[u8])
    -> Result<Zeroizing<Vec<u8>>, MechanismError>;

    /// Whether the client side of the exchange has finished.
    fn is_complete(&self) -> bool;

    /// Wipe credential material. Further use fails with
    /// [`MechanismError::Disposed`].
    fn dispose(&mut self);
}

/// Creates [`Mechanism`] instances by name.
pub trait MechanismProvider: Send + Sync {
    fn name(&self) -> &str;

    fn create(&self, credentials: Credentials) -> Box<dyn Mechanism>;
}

/// Errors raised while evaluating challenges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MechanismError {
    #[error("{mechanism} received a challenge it did not expect")]
    UnexpectedChallenge { mechanism: &'static str },

    #[error("mechanism used after dispose")]
    Disposed,

    #[error("challenge exceeds {0} bytes")]
    ChallengeTooLong(usize),

    #[error("SCRAM: {0}")]
    Scram(#[from] ScramError),
}
