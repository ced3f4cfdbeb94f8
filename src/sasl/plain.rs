//! PLAIN mechanism (RFC 4616).

use zeroize::{Zeroize, Zeroizing};

use super::Credentials;
use super::mechanism::{Mechanism, MechanismError};

/// `authzid NUL authcid NUL password`, sent in reply to the empty initial
/// challenge.
pub struct PlainMechanism {
    credentials: Option<Credentials>,
    sent: bool,
}

impl PlainMechanism {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            sent: false,
        }
    }
}

/// Encode a PLAIN message. The result holds the secret and wipes itself.
pub fn encode_plain(authzid: &str, authcid: &str, password: &str) -> Zeroizing<Vec<u8>> {
    let mut message = Zeroizing::new(Vec::with_capacity(
        authzid.len() + authcid.len() + password.len() + 2,
    ));
    message.extend_from_slice(authzid.as_bytes());
    message.push(0);
    message.extend_from_slice(authcid.as_bytes());
    message.push(0);
    message.extend_from_slice(password.as_bytes());
    message
}

impl Mechanism for PlainMechanism {
    fn name(&self) -> &'static str {
        "PLAIN"
    }

    fn begin(&mut self) -> Result<(), MechanismError> {
        if self.credentials.is_none() {
            return Err(MechanismError::Disposed);
        }
        self.sent = false;
        Ok(())
    }

    fn evaluate_challenge(
        &mut self,
        challenge: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, MechanismError> {
        let creds = self.credentials.as_ref().ok_or(MechanismError::Disposed)?;
        if self.sent || !challenge.is_empty() {
            return Err(MechanismError::UnexpectedChallenge { mechanism: "PLAIN" });
        }
        self.sent = true;
        Ok(encode_plain(
            creds.authzid.as_deref().unwrap_or(""),
            &creds.authcid,
            creds.secret(),
        ))
    }

    fn is_complete(&self) -> bool {
        self.sent
    }

    fn dispose(&mut self) {
        if let Some(mut creds) = self.credentials.take() {
            creds.zeroize();
        }
    }
}
