//! EXTERNAL mechanism.
//!
//! Identity comes from the TLS client certificate. The response carries only
//! the optional authorization identity.

use zeroize::Zeroizing;

use super::Credentials;
use super::mechanism::{Mechanism, MechanismError};

pub struct ExternalMechanism {
    authzid: Option<String>,
    sent: bool,
    disposed: bool,
}

impl ExternalMechanism {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            authzid: credentials.authzid.clone().filter(|id| !id.is_empty()),
            sent: false,
            disposed: false,
        }
    }
}

impl Mechanism for ExternalMechanism {
    fn name(&self) -> &'static str {
        "EXTERNAL"
    }

    fn begin(&mut self) -> Result<(), MechanismError> {
        if self.disposed {
            return Err(MechanismError::Disposed);
        }
        self.sent = false;
        Ok(())
    }

    fn evaluate_challenge(
        &mut self,
        challenge: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, MechanismError> {
        if self.disposed {
            return Err(MechanismError::Disposed);
        }
        if self.sent || !challenge.is_empty() {
            return Err(MechanismError::UnexpectedChallenge {
                mechanism: "EXTERNAL",
            });
        }
        self.sent = true;
        let response = self
            .authzid
            .as_deref()
            .map(|id| id.as_bytes().to_vec())
            .unwrap_or_default();
        Ok(Zeroizing::new(response))
    }

    fn is_complete(&self) -> bool {
        self.sent
    }

    fn dispose(&mut self) {
        self.authzid = None;
        self.disposed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_response_by_default() {
        let mut mech = ExternalMechanism::new(Credentials::new("", ""));
        mech.begin().unwrap();
        assert!(mech.evaluate_challenge(b"").unwrap().is_empty());
        assert!(mech.is_complete());
    }

    #[test]
    fn authzid_is_sent() {
        let creds = Credentials::new("", "").with_authzid("myuser");
        let mut mech = ExternalMechanism::new(creds);
        mech.begin().unwrap();
        assert_eq!(&mech.evaluate_challenge(b"").unwrap()[..], b"myuser");
    }
}
