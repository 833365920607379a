// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-side secret handling.
//!
//! [`SecretBox`] encrypts values that must be recoverable by the server:
//! emailed one-time codes and custodial wallet private keys. Ciphertext is
//! `base64(nonce || ciphertext)` with a fresh 12-byte nonce per value.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64ct::{Base64, Encoding};
use rand::{Rng, RngCore};
use subtle::ConstantTimeEq;

const NONCE_LEN: usize = 12;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("invalid key length")]
    InvalidKey,

    #[error("encryption failed")]
    Encrypt,

    /// Wrong key, tampered ciphertext or truncated input.
    #[error("decryption failed")]
    Decrypt,

    #[error("ciphertext is not valid base64")]
    Encoding,

    #[error("decrypted value is not valid UTF-8")]
    Utf8,
}

/// AES-256-GCM box keyed by `SERVER_SECRET_KEY`.
#[derive(Clone)]
pub struct SecretBox {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBox(..)")
    }
}

impl SecretBox {
    pub fn new(key: &[u8; 32]) -> Result<Self, SecretError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| SecretError::InvalidKey)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, SecretError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| SecretError::Encrypt)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&sealed))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>, SecretError> {
        let sealed = Base64::decode_vec(encoded).map_err(|_| SecretError::Encoding)?;
        if sealed.len() <= NONCE_LEN {
            return Err(SecretError::Decrypt);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let nonce_bytes: [u8; NONCE_LEN] =
            nonce_bytes.try_into().map_err(|_| SecretError::Decrypt)?;
        self.cipher
            .decrypt(&Nonce::from(nonce_bytes), ciphertext)
            .map_err(|_| SecretError::Decrypt)
    }

    pub fn encrypt_str(&self, plaintext: &str) -> Result<String, SecretError> {
        self.encrypt(plaintext.as_bytes())
    }

    pub fn decrypt_str(&self, encoded: &str) -> Result<String, SecretError> {
        String::from_utf8(self.decrypt(encoded)?).map_err(|_| SecretError::Utf8)
    }
}

/// Random numeric code of `len` digits, leading zeros allowed.
pub fn generate_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Compare a client-supplied code with the decrypted stored one.
///
/// Must match byte for byte. Blank input and the literal `"undefined"` never match.
pub fn codes_match(supplied: &str, expected: &str) -> bool {
    if supplied.is_empty() || supplied == "undefined" || expected.is_empty() {
        return false;
    }
    supplied.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret_box() -> SecretBox {
        SecretBox::new(&[7u8; 32]).unwrap()
    }

    #[test]
    fn code_survives_encrypt_then_decrypt() {
        let sb = secret_box();
        let code = generate_code(6);
        let sealed = sb.encrypt_str(&code).unwrap();
        assert_ne!(sealed, code);
        let opened = sb.decrypt_str(&sealed).unwrap();
        assert!(codes_match(&code, &opened));
    }

    #[test]
    fn nonces_make_ciphertexts_differ() {
        let sb = secret_box();
        assert_ne!(sb.encrypt_str("123456").unwrap(), sb.encrypt_str("123456").unwrap());
    }

    #[test]
    fn wrong_key_or_tampering_fails() {
        let sealed = secret_box().encrypt_str("123456").unwrap();
        let other = SecretBox::new(&[8u8; 32]).unwrap();
        assert!(matches!(other.decrypt_str(&sealed), Err(SecretError::Decrypt)));
        assert!(matches!(secret_box().decrypt_str("!!!"), Err(SecretError::Encoding)));
        assert!(matches!(secret_box().decrypt_str("AAAA"), Err(SecretError::Decrypt)));
    }

    #[test]
    fn generated_codes_are_numeric() {
        let code = generate_code(8);
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn sentinel_and_mismatched_codes_never_match() {
        assert!(codes_match("123456", "123456"));
        assert!(!codes_match(" 123456 ", "123456"));
        assert!(!codes_match("123456\n", "123456"));
        assert!(!codes_match("123457", "123456"));
        assert!(!codes_match("12345", "123456"));
        assert!(!codes_match("", "123456"));
        assert!(!codes_match("undefined", "undefined"));
        assert!(!codes_match("123456", ""));
    }
}
