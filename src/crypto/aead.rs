//! Timevault - AEAD Encryption
//!
//! AES-256-GCM over whole snapshots. Decryption failure is the only signal
//! for a wrong password or tampered data; no password verifier is stored.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};

use super::keys::{generate_nonce, generate_salt, SessionKey, VaultKey, NONCE_LEN};
use crate::envelope::Envelope;
use crate::error::{VaultError, VaultResult};

// ═══════════════════════════════════════════════════════════════════════════
// RAW AES-256-GCM
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt data with AES-256-GCM under an explicit nonce
pub fn encrypt_aes_gcm(
    key: &VaultKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| VaultError::EncryptionFailed(e.to_string()))
}

/// Decrypt data with AES-256-GCM
pub fn decrypt_aes_gcm(
    key: &VaultKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> VaultResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.expose())
        .map_err(|_| VaultError::AuthFailure)?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| VaultError::AuthFailure)
}

// ═══════════════════════════════════════════════════════════════════════════
// ENVELOPES
// ═══════════════════════════════════════════════════════════════════════════

/// Encrypt under a fresh salt, fresh derived key and fresh nonce
pub fn seal(plaintext: &[u8], session: &SessionKey) -> VaultResult<Envelope> {
    let salt = generate_salt()?;
    let nonce = generate_nonce()?;
    let key = session.derive(&salt);

    let ciphertext = encrypt_aes_gcm(&key, &nonce, plaintext)?;
    Ok(Envelope::new(&salt, &nonce, &ciphertext))
}

/// Re-derive the key from the envelope's salt and decrypt
pub fn open(envelope: &Envelope, session: &SessionKey) -> VaultResult<Vec<u8>> {
    let salt = envelope.salt()?;
    let nonce = envelope.nonce()?;
    let ciphertext = envelope.ciphertext()?;

    let key = session.derive(&salt);
    decrypt_aes_gcm(&key, &nonce, &ciphertext)
}

/// Decrypt a stored envelope string to text
pub fn open_str(value: &str, session: &SessionKey) -> VaultResult<String> {
    let envelope = Envelope::decode(value)?;
    let plaintext = open(&envelope, session)?;
    String::from_utf8(plaintext)
        .map_err(|_| VaultError::Format("decrypted payload is not UTF-8".into()))
}

/// Encrypt a string with a password, returning the wire envelope
pub fn encrypt_data(data: &str, password: &str) -> VaultResult<String> {
    let session = SessionKey::new(password);
    Ok(seal(data.as_bytes(), &session)?.to_string())
}

/// Decrypt a wire envelope produced by [`encrypt_data`]
pub fn decrypt_data(encrypted: &str, password: &str) -> VaultResult<String> {
    open_str(encrypted, &SessionKey::new(password))
}

/// Verify at start-up that the RNG and AEAD primitives work
pub fn self_check() -> VaultResult<()> {
    let mut probe = [0u8; 32];
    super::keys::fill_random(&mut probe)?;

    let key = VaultKey::new(probe);
    let nonce = generate_nonce()?;
    let ct = encrypt_aes_gcm(&key, &nonce, b"timevault self check")
        .map_err(|e| VaultError::PrimitiveUnavailable(e.to_string()))?;
    let pt = decrypt_aes_gcm(&key, &nonce, &ct)
        .map_err(|e| VaultError::PrimitiveUnavailable(e.to_string()))?;

    if pt != b"timevault self check" {
        return Err(VaultError::PrimitiveUnavailable("AEAD round trip mismatch".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KEY_LEN;

    #[test]
    fn test_aes_gcm_roundtrip() {
        let key = VaultKey::new([5u8; KEY_LEN]);
        let nonce = [1u8; NONCE_LEN];
        let ct = encrypt_aes_gcm(&key, &nonce, b"hello").unwrap();
        assert_eq!(decrypt_aes_gcm(&key, &nonce, &ct).unwrap(), b"hello");
    }

    #[test]
    fn test_roundtrip_with_password() {
        for text in ["", "plain", "{\"state\":{\"tasks\":[]},\"version\":0}", "zażółć 🕒"] {
            let enc = encrypt_data(text, "correct horse").unwrap();
            assert_eq!(decrypt_data(&enc, "correct horse").unwrap(), text);
        }
    }

    #[test]
    fn test_wrong_password_fails() {
        let enc = encrypt_data("secret", "pw1").unwrap();
        assert!(matches!(decrypt_data(&enc, "pw2"), Err(VaultError::AuthFailure)));
    }

    #[test]
    fn test_tamper_any_ciphertext_byte_fails() {
        let session = SessionKey::new("pw");
        let env = seal(b"tamper me", &session).unwrap();
        let salt = env.salt().unwrap();
        let nonce = env.nonce().unwrap();
        let ct = env.ciphertext().unwrap();
        let key = session.derive(&salt);

        // Every byte, including the tag
        for i in 0..ct.len() {
            let mut flipped = ct.clone();
            flipped[i] ^= 0x01;
            assert!(matches!(
                decrypt_aes_gcm(&key, &nonce, &flipped),
                Err(VaultError::AuthFailure)
            ));
        }

        let mut flipped = ct.clone();
        flipped[0] ^= 0xff;
        let tampered = Envelope::new(&salt, &nonce, &flipped);
        assert!(matches!(open(&tampered, &session), Err(VaultError::AuthFailure)));
    }

    #[test]
    fn test_tampered_nonce_fails() {
        let session = SessionKey::new("pw");
        let env = seal(b"payload", &session).unwrap();
        let mut nonce = env.nonce().unwrap();
        nonce[0] ^= 0x80;
        let tampered = Envelope::new(&env.salt().unwrap(), &nonce, &env.ciphertext().unwrap());
        assert!(matches!(open(&tampered, &session), Err(VaultError::AuthFailure)));
    }

    #[test]
    fn test_fresh_randomness() {
        let a = encrypt_data("same", "same").unwrap();
        let b = encrypt_data("same", "same").unwrap();
        assert_ne!(a, b);

        let ea = Envelope::decode(&a).unwrap();
        let eb = Envelope::decode(&b).unwrap();
        assert_ne!(ea.salt().unwrap(), eb.salt().unwrap());
        assert_ne!(ea.nonce().unwrap(), eb.nonce().unwrap());
    }

    #[test]
    fn test_malformed_input_is_format_error() {
        assert!(matches!(decrypt_data("a:b", "pw"), Err(VaultError::Format(_))));
        assert!(matches!(decrypt_data("a:b:c", "pw"), Err(VaultError::Format(_))));
    }

    #[test]
    fn test_self_check() {
        self_check().unwrap();
    }
}
