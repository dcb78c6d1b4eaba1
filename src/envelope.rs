//! Serialized envelope - the only persisted form of vault data
//!
//! ```text
//! base64(salt) ":" base64(nonce) ":" base64(ciphertext || tag)
//! ```
//!
//! Parsing is structural: a string with three non-empty segments is an
//! envelope. Whether the segments are valid base64 of the right length is
//! checked when the bytes are taken out for decryption.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::crypto::{NONCE_LEN, SALT_LEN};
use crate::error::{VaultError, VaultResult};

const SEPARATOR: char = ':';

/// Salt, nonce and ciphertext, kept in their base64 text form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    salt: String,
    nonce: String,
    ciphertext: String,
}

impl Envelope {
    /// Build an envelope from raw bytes
    pub fn new(salt: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            salt: STANDARD.encode(salt),
            nonce: STANDARD.encode(nonce),
            ciphertext: STANDARD.encode(ciphertext),
        }
    }

    /// Encode raw parts straight to the wire string
    pub fn encode(salt: &[u8], nonce: &[u8], ciphertext: &[u8]) -> String {
        Self::new(salt, nonce, ciphertext).to_string()
    }

    /// Split a stored string into its three segments
    pub fn decode(value: &str) -> VaultResult<Self> {
        let parts: Vec<&str> = value.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(VaultError::Format(format!(
                "expected 3 segments, found {}",
                parts.len()
            )));
        }
        if parts.iter().any(|p| p.is_empty()) {
            return Err(VaultError::Format("empty segment".into()));
        }

        Ok(Self {
            salt: parts[0].to_string(),
            nonce: parts[1].to_string(),
            ciphertext: parts[2].to_string(),
        })
    }

    pub fn salt(&self) -> VaultResult<[u8; SALT_LEN]> {
        decode_fixed(&self.salt, "salt")
    }

    pub fn nonce(&self) -> VaultResult<[u8; NONCE_LEN]> {
        decode_fixed(&self.nonce, "nonce")
    }

    pub fn ciphertext(&self) -> VaultResult<Vec<u8>> {
        decode_segment(&self.ciphertext, "ciphertext")
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.salt,
            self.nonce,
            self.ciphertext,
            sep = SEPARATOR
        )
    }
}

impl FromStr for Envelope {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

fn decode_segment(segment: &str, what: &str) -> VaultResult<Vec<u8>> {
    STANDARD
        .decode(segment)
        .map_err(|e| VaultError::Format(format!("invalid base64 in {}: {}", what, e)))
}

fn decode_fixed<const N: usize>(segment: &str, what: &str) -> VaultResult<[u8; N]> {
    let bytes = decode_segment(segment, what)?;
    bytes.as_slice().try_into().map_err(|_| {
        VaultError::Format(format!(
            "{} must be {} bytes, got {}",
            what,
            N,
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_wrong_segment_count() {
        assert!(matches!(Envelope::decode("a:b"), Err(VaultError::Format(_))));
        assert!(matches!(Envelope::decode("a:b:c:d"), Err(VaultError::Format(_))));
        assert!(matches!(Envelope::decode(""), Err(VaultError::Format(_))));
    }

    #[test]
    fn test_decode_is_structural() {
        // Not valid base64, but structurally an envelope
        let env = Envelope::decode("a:b:c").unwrap();
        assert!(matches!(env.salt(), Err(VaultError::Format(_))));
        assert!(matches!(env.ciphertext(), Err(VaultError::Format(_))));
    }

    #[test]
    fn test_decode_rejects_empty_segment() {
        assert!(Envelope::decode("a::c").is_err());
        assert!(Envelope::decode(":b:c").is_err());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let salt = [3u8; SALT_LEN];
        let nonce = [4u8; NONCE_LEN];
        let ct = b"ciphertext with tag \x00\xff";

        let wire = Envelope::encode(&salt, &nonce, ct);
        assert_eq!(wire.matches(':').count(), 2);

        let env: Envelope = wire.parse().unwrap();
        assert_eq!(env.salt().unwrap(), salt);
        assert_eq!(env.nonce().unwrap(), nonce);
        assert_eq!(env.ciphertext().unwrap(), ct.to_vec());
        assert_eq!(env.to_string(), wire);
    }

    #[test]
    fn test_wrong_length_salt_is_format_error() {
        let wire = Envelope::encode(&[1u8; 8], &[2u8; NONCE_LEN], b"x");
        let env = Envelope::decode(&wire).unwrap();
        assert!(matches!(env.salt(), Err(VaultError::Format(_))));
    }
}
