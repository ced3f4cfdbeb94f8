//! Standard-alphabet base64 with mandatory `=` padding.
//!
//! Decoding checks the padding shape before handing the input to the
//! `base64` crate so that each malformed input maps to one precise
//! [`Base64Error`].

use ::base64::Engine as _;
use ::base64::engine::general_purpose::STANDARD;
use thiserror::Error;

/// Why an input is not valid padded base64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Base64Error {
    #[error("unexpected padding")]
    UnexpectedPadding,

    #[error("missing padding")]
    MissingPadding,

    #[error("truncated input")]
    Truncated,

    #[error("invalid symbol {byte:#04x} at offset {offset}")]
    InvalidSymbol { offset: usize, byte: u8 },
}

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(input: &str) -> Result<Vec<u8>, Base64Error> {
    check_padding(input)?;
    STANDARD.decode(input).map_err(|e| match e {
        ::base64::DecodeError::InvalidByte(offset, byte)
        | ::base64::DecodeError::InvalidLastSymbol(offset, byte) => {
            Base64Error::InvalidSymbol { offset, byte }
        }
        ::base64::DecodeError::InvalidLength(_) => Base64Error::Truncated,
        ::base64::DecodeError::InvalidPadding => Base64Error::UnexpectedPadding,
    })
}

fn check_padding(input: &str) -> Result<(), Base64Error> {
    let body = input.trim_end_matches('=');
    let padding = input.len() - body.len();
    if padding > 2 || body.contains('=') {
        return Err(Base64Error::UnexpectedPadding);
    }
    match (body.len() % 4, padding) {
        (0, 0) | (2, 2) | (3, 1) => Ok(()),
        (1, _) => Err(Base64Error::Truncated),
        (2, _) | (3, 0) => Err(Base64Error::MissingPadding),
        _ => Err(Base64Error::UnexpectedPadding),
    }
}
