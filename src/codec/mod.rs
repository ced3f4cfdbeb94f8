//! Encoding seams used by the negotiation handlers.

pub mod base64;

pub use self::base64::Base64Error;
