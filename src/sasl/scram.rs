//! SCRAM-SHA-256 mechanism (RFC 5802, RFC 7677).
//!
//! 1. Client sends `client-first-message`: `n,,n=user,r=nonce`
//! 2. Server sends `server-first-message`: `r=nonce+server,s=salt,i=iterations`
//! 3. Client sends `client-final-message`: `c=biws,r=nonce+server,p=proof`
//! 4. Server sends `server-final-message`: `v=verifier`
//!
//! The server signature is checked in constant time before the exchange is
//! considered complete; the client then answers with an empty response.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

use super::Credentials;
use super::mechanism::{Mechanism, MechanismError};
use crate::codec::base64;

/// Client nonce length in bytes before encoding.
const NONCE_LEN: usize = 24;

/// Lowest iteration count accepted from a server (RFC 7677 recommends 4096).
const MIN_ITERATIONS: u32 = 4096;

/// Errors that can occur during SCRAM authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScramError {
    #[error("invalid encoding in server message")]
    InvalidEncoding,
    #[error("server nonce doesn't extend the client nonce")]
    NonceMismatch,
    #[error("missing nonce in server message")]
    MissingNonce,
    #[error("missing salt in server message")]
    MissingSalt,
    #[error("missing iteration count")]
    MissingIterations,
    #[error("invalid iteration count")]
    InvalidIterations,
    #[error("server reported error: {0}")]
    ServerError(String),
    #[error("server verification failed")]
    ServerVerificationFailed,
    #[error("server message out of order")]
    OutOfOrder,
    #[error("crypto error: {0}")]
    Crypto(&'static str),
}

enum Step {
    Initial,
    ClientFirstSent {
        bare: String,
    },
    ClientFinalSent {
        server_signature: Zeroizing<[u8; 32]>,
    },
    Complete,
}

pub struct ScramSha256 {
    credentials: Option<Credentials>,
    client_nonce: String,
    step: Step,
}

impl ScramSha256 {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials),
            client_nonce: String::new(),
            step: Step::Initial,
        }
    }

    fn client_first(&mut self) -> Result<Zeroizing<Vec<u8>>, MechanismError> {
        let creds = self.credentials.as_ref().ok_or(MechanismError::Disposed)?;
        let bare = format!("n={},r={}", escape_username(&creds.authcid), self.client_nonce);
        let gs2 = match creds.authzid.as_deref() {
            Some(authzid) if !authzid.is_empty() => {
                format!("n,a={},", escape_username(authzid))
            }
            _ => "n,,".to_string(),
        };
        let message = format!("{gs2}{bare}");
        self.step = Step::ClientFirstSent { bare };
        Ok(Zeroizing::new(message.into_bytes()))
    }

    fn client_final(
        &mut self,
        bare: &str,
        server_first: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, MechanismError> {
        let creds = self.credentials.as_ref().ok_or(MechanismError::Disposed)?;
        let server_first = std::str::from_utf8(server_first).map_err(|_| ScramError::InvalidEncoding)?;
        let first = parse_server_first(server_first)?;
        if !first.nonce.starts_with(&self.client_nonce) || first.nonce.len() == self.client_nonce.len()
        {
            return Err(ScramError::NonceMismatch.into());
        }

        let salted_password = hi(creds.secret(), &first.salt, first.iterations)?;
        let client_key = hmac_sha256(&salted_password[..], b"Client Key")?;
        let stored_key = sha256(&client_key[..]);

        let gs2 = match creds.authzid.as_deref() {
            Some(authzid) if !authzid.is_empty() => format!("n,a={},", escape_username(authzid)),
            _ => "n,,".to_string(),
        };
        let without_proof = format!("c={},r={}", base64::encode(gs2.as_bytes()), first.nonce);
        let auth_message = format!("{bare},{server_first},{without_proof}");

        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let mut proof = Zeroizing::new([0u8; 32]);
        for (p, (k, s)) in proof
            .iter_mut()
            .zip(client_key.iter().zip(client_signature.iter()))
        {
            *p = k ^ s;
        }

        let server_key = hmac_sha256(&salted_password[..], b"Server Key")?;
        let server_signature = hmac_sha256(&server_key[..], auth_message.as_bytes())?;

        let message = format!("{without_proof},p={}", base64::encode(&proof[..]));
        self.step = Step::ClientFinalSent {
            server_signature: Zeroizing::new(server_signature),
        };
        Ok(Zeroizing::new(message.into_bytes()))
    }

    fn verify_server_final(
        expected: &[u8; 32],
        server_final: &[u8],
    ) -> Result<(), ScramError> {
        let message = std::str::from_utf8(server_final).map_err(|_| ScramError::InvalidEncoding)?;
        if let Some(error) = message.strip_prefix("e=") {
            return Err(ScramError::ServerError(error.to_string()));
        }
        let verifier = message
            .split(',')
            .find_map(|part| part.strip_prefix("v="))
            .ok_or(ScramError::ServerVerificationFailed)?;
        let signature = base64::decode(verifier).map_err(|_| ScramError::InvalidEncoding)?;
        if bool::from(signature.as_slice().ct_eq(expected)) {
            Ok(())
        } else {
            Err(ScramError::ServerVerificationFailed)
        }
    }
}

impl Mechanism for ScramSha256 {
    fn name(&self) -> &'static str {
        "SCRAM-SHA-256"
    }

    fn begin(&mut self) -> Result<(), MechanismError> {
        if self.credentials.is_none() {
            return Err(MechanismError::Disposed);
        }
        self.client_nonce = generate_nonce();
        self.step = Step::Initial;
        Ok(())
    }

    fn evaluate_challenge(
        &mut self,
        challenge: &[u8],
    ) -> Result<Zeroizing<Vec<u8>>, MechanismError> {
        if self.credentials.is_none() {
            return Err(MechanismError::Disposed);
        }
        match std::mem::replace(&mut self.step, Step::Initial) {
            Step::Initial if challenge.is_empty() => self.client_first(),
            Step::ClientFirstSent { bare } => self.client_final(&bare, challenge),
            Step::ClientFinalSent { server_signature } => {
                Self::verify_server_final(&server_signature, challenge)?;
                self.step = Step::Complete;
                Ok(Zeroizing::new(Vec::new()))
            }
            Step::Initial | Step::Complete => Err(ScramError::OutOfOrder.into()),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.step, Step::Complete)
    }

    fn dispose(&mut self) {
        if let Some(mut creds) = self.credentials.take() {
            creds.zeroize();
        }
        self.client_nonce.zeroize();
        self.step = Step::Initial;
    }
}

struct ServerFirst {
    nonce: String,
    salt: Vec<u8>,
    iterations: u32,
}

fn parse_server_first(message: &str) -> Result<ServerFirst, ScramError> {
    if let Some(error) = message.strip_prefix("e=") {
        return Err(ScramError::ServerError(error.to_string()));
    }
    let mut nonce = None;
    let mut salt = None;
    let mut iterations = None;

    for part in message.split(',') {
        if let Some(value) = part.strip_prefix("r=") {
            nonce = Some(value.to_string());
        } else if let Some(value) = part.strip_prefix("s=") {
            salt = Some(base64::decode(value).map_err(|_| ScramError::InvalidEncoding)?);
        } else if let Some(value) = part.strip_prefix("i=") {
            iterations = Some(
                value
                    .parse::<u32>()
                    .map_err(|_| ScramError::InvalidIterations)?,
            );
        }
    }

    let nonce = nonce.ok_or(ScramError::MissingNonce)?;
    let salt = salt.ok_or(ScramError::MissingSalt)?;
    let iterations = iterations.ok_or(ScramError::MissingIterations)?;
    if iterations < MIN_ITERATIONS {
        return Err(ScramError::InvalidIterations);
    }
    Ok(ServerFirst {
        nonce,
        salt,
        iterations,
    })
}

/// `=` and `,` are escaped in SCRAM usernames.
fn escape_username(name: &str) -> String {
    name.replace('=', "=3D").replace(',', "=2C")
}

fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    base64::encode(&bytes)
}

// ============================================================================
// Cryptographic primitives
// ============================================================================

/// Hi() from RFC 5802: PBKDF2-HMAC-SHA256.
pub(crate) fn hi(
    password: &str,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; 32]>, ScramError> {
    let mut output = Zeroizing::new([0u8; 32]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut output[..])
        .map_err(|_| ScramError::Crypto("PBKDF2 failed"))?;
    Ok(output)
}

pub(crate) fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], ScramError> {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key)
        .map_err(|_| ScramError::Crypto("HMAC initialization failed"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

pub(crate) fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}
