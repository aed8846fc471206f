//! Token decryption for Keygate
//!
//! Session tokens are sealed with AES-256-GCM under a key that Argon2
//! derives from the caller's identity key. The gateway only ever opens
//! tokens; `seal` exists for the CLI and for whatever issues sessions.

mod encrypt;

pub use encrypt::{open, seal, CryptoError, SealedToken};

use crate::credential::IdentityKey;
use async_trait::async_trait;

/// Decrypts an encrypted session token with an identity key
#[async_trait]
pub trait Decryptor: Send + Sync {
    /// Decrypt `ciphertext` and return the plaintext bearer token
    async fn decrypt(&self, ciphertext: &str, key: &IdentityKey) -> Result<String, CryptoError>;
}

/// Default decryptor for `salt:nonce:ciphertext` tokens
///
/// Every call derives its key with default Argon2id parameters, which
/// allocates about 19 MiB and takes tens of milliseconds. A session carrying
/// both a wallet address and an email pays that twice per request. The work
/// is CPU bound, so it runs on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct AesGcmDecryptor;

impl AesGcmDecryptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Decryptor for AesGcmDecryptor {
    async fn decrypt(&self, ciphertext: &str, key: &IdentityKey) -> Result<String, CryptoError> {
        let sealed = SealedToken::decode(ciphertext)?;
        let key = key.clone();

        tokio::task::spawn_blocking(move || open(&sealed, key.expose()))
            .await
            .map_err(|e| CryptoError::DecryptionFailed(format!("Decryption task failed: {}", e)))?
    }
}
