//! Sealed bearer tokens using AES-256-GCM with Argon2 key derivation

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{password_hash::SaltString, Argon2, PasswordHasher};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};
use thiserror::Error;

/// Cryptographic errors
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Invalid key length")]
    InvalidKeyLength,

    #[error("Invalid token format: {0}")]
    InvalidFormat(String),
}

/// Size of the AES-256 key in bytes
const KEY_SIZE: usize = 32;

/// Size of the GCM nonce in bytes
const NONCE_SIZE: usize = 12;

/// Size of the Argon2 salt in bytes
const SALT_SIZE: usize = 16;

/// An AES key derived from an identity key
struct TokenKey {
    key: SecretBox<[u8; KEY_SIZE]>,
}

impl TokenKey {
    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength);
        }
        let mut key_array = [0u8; KEY_SIZE];
        key_array.copy_from_slice(&bytes[..KEY_SIZE]);
        Ok(Self {
            key: SecretBox::new(Box::new(key_array)),
        })
    }

    fn as_bytes(&self) -> &[u8] {
        self.key.expose_secret().as_slice()
    }
}

/// An encrypted bearer token as stored in a session
///
/// Every part is standard base64. The textual form is `salt:nonce:ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedToken {
    /// Argon2 salt
    pub salt: String,
    /// GCM nonce
    pub nonce: String,
    /// Ciphertext with authentication tag
    pub ciphertext: String,
}

impl SealedToken {
    /// Serialize to the single-string session form
    pub fn encode(&self) -> String {
        format!("{}:{}:{}", self.salt, self.nonce, self.ciphertext)
    }

    /// Parse from the single-string session form
    pub fn decode(s: &str) -> Result<Self, CryptoError> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(salt), Some(nonce), Some(ciphertext))
                if !salt.is_empty() && !nonce.is_empty() && !ciphertext.is_empty() =>
            {
                Ok(Self {
                    salt: salt.to_string(),
                    nonce: nonce.to_string(),
                    ciphertext: ciphertext.to_string(),
                })
            }
            _ => Err(CryptoError::InvalidFormat(
                "Expected format: salt:nonce:ciphertext".to_string(),
            )),
        }
    }
}

/// Derive the AES key for an identity key using Argon2
fn derive_key(identity_key: &str, salt: &[u8]) -> Result<TokenKey, CryptoError> {
    let salt_string = SaltString::encode_b64(salt)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let hash = Argon2::default()
        .hash_password(identity_key.as_bytes(), &salt_string)
        .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;

    let output = hash
        .hash
        .ok_or_else(|| CryptoError::KeyDerivationFailed("No hash output".to_string()))?;

    TokenKey::from_bytes(output.as_bytes())
}

/// Encrypt a bearer token for an identity key
pub fn seal(plaintext: &str, identity_key: &str) -> Result<SealedToken, CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let key = derive_key(identity_key, &salt)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok(SealedToken {
        salt: STANDARD.encode(salt),
        nonce: STANDARD.encode(nonce_bytes),
        ciphertext: STANDARD.encode(ciphertext),
    })
}

/// Decrypt a sealed bearer token with an identity key
pub fn open(sealed: &SealedToken, identity_key: &str) -> Result<String, CryptoError> {
    let salt = STANDARD
        .decode(&sealed.salt)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid salt: {}", e)))?;

    let nonce_bytes = STANDARD
        .decode(&sealed.nonce)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid nonce: {}", e)))?;

    if nonce_bytes.len() != NONCE_SIZE {
        return Err(CryptoError::DecryptionFailed(format!(
            "Invalid nonce length: expected {}, got {}",
            NONCE_SIZE,
            nonce_bytes.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(&sealed.ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid ciphertext: {}", e)))?;

    let key = derive_key(identity_key, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| {
            CryptoError::DecryptionFailed(
                "invalid identity key or corrupted token".to_string(),
            )
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| CryptoError::DecryptionFailed(format!("Invalid UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_with_wallet_key() {
        let sealed = seal("tok123", "0xAbC123").unwrap();
        let opened = open(&sealed, "0xAbC123").unwrap();
        assert_eq!(opened, "tok123");
    }

    #[test]
    fn test_wrong_identity_key_fails() {
        let sealed = seal("tok123", "alicemailcom").unwrap();
        let result = open(&sealed, "bobmailcom");
        assert!(matches!(result, Err(CryptoError::DecryptionFailed(_))));
    }

    #[test]
    fn test_each_seal_uses_fresh_salt_and_nonce() {
        let a = seal("tok123", "key").unwrap();
        let b = seal("tok123", "key").unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.nonce, b.nonce);
    }

    #[test]
    fn test_encoded_form_survives_decode() {
        let sealed = seal("bearer-value", "key").unwrap();
        let parsed = SealedToken::decode(&sealed.encode()).unwrap();
        assert_eq!(parsed, sealed);
        assert_eq!(open(&parsed, "key").unwrap(), "bearer-value");
    }

    #[test]
    fn test_decode_rejects_malformed_tokens() {
        assert!(matches!(
            SealedToken::decode("not-a-token"),
            Err(CryptoError::InvalidFormat(_))
        ));
        assert!(matches!(
            SealedToken::decode("salt::ciphertext"),
            Err(CryptoError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_open_rejects_bad_base64() {
        let sealed = SealedToken {
            salt: "c2FsdHNhbHRzYWx0c2FsdA==".to_string(),
            nonce: "!!!".to_string(),
            ciphertext: "AAAA".to_string(),
        };
        assert!(matches!(
            open(&sealed, "key"),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }
}
