//! Integration test common infrastructure.
//!
//! Provides a scripted server peer that drives a [`Session`] and asserts on
//! the lines it writes.

pub mod peer;

#[allow(unused_imports)]
pub use peer::TestPeer;
