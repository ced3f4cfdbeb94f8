//! `AUTHENTICATE` payload chunking.
//!
//! Payloads travel base64 encoded in lines of at most 400 bytes. A chunk
//! shorter than 400 bytes ends the payload; a payload whose length is an
//! exact multiple of 400 is terminated by a lone `+`, which also stands for
//! an empty payload.

use zeroize::Zeroizing;

use super::MechanismError;

/// Maximum length of a single `AUTHENTICATE` chunk.
pub const SASL_CHUNK_SIZE: usize = 400;

/// Largest reassembled challenge accepted from a server.
const MAX_CHALLENGE: usize = 16 * 1024;

/// Split an encoded response into `AUTHENTICATE` parameters.
///
/// Every chunk but the last is exactly [`SASL_CHUNK_SIZE`] bytes, since the
/// receiver treats any shorter chunk as the end of the payload.
pub fn chunk_response(encoded: &str) -> Vec<String> {
    if encoded.is_empty() {
        return vec!["+".to_string()];
    }
    let mut chunks: Vec<String> = encoded
        .as_bytes()
        .chunks(SASL_CHUNK_SIZE)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect();
    if encoded.len() % SASL_CHUNK_SIZE == 0 {
        chunks.push("+".to_string());
    }
    chunks
}

/// Reassembles a chunked server challenge.
#[derive(Default)]
pub struct ChallengeBuffer {
    buffer: Zeroizing<String>,
}

impl ChallengeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one chunk. Returns the full encoded payload once the final chunk
    /// has arrived (empty for a lone `+`).
    pub fn push(&mut self, chunk: &str) -> Result<Option<Zeroizing<String>>, MechanismError> {
        if chunk == "+" {
            return Ok(Some(self.take()));
        }
        if self.buffer.len() + chunk.len() > MAX_CHALLENGE {
            self.clear();
            return Err(MechanismError::ChallengeTooLong(MAX_CHALLENGE));
        }
        self.buffer.push_str(chunk);
        if chunk.len() < SASL_CHUNK_SIZE {
            Ok(Some(self.take()))
        } else {
            Ok(None)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer = Zeroizing::new(String::new());
    }

    fn take(&mut self) -> Zeroizing<String> {
        std::mem::take(&mut self.buffer)
    }
}
