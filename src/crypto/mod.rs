//! Timevault - Cryptographic Core
//!
//! PBKDF2-HMAC-SHA256 key derivation and AES-256-GCM envelopes.

pub mod keys;
pub mod aead;

pub use keys::*;
pub use aead::*;
