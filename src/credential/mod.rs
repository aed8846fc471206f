//! Credential derivation
//!
//! Turns a resolved session into the bearer credential presented to the
//! upstream API:
//! - Picks an identity key from the session (wallet address or email)
//! - Decrypts the session token with that key
//! - Builds the outbound header set

mod headers;

pub use headers::{HeaderBuilder, OutboundHeaders};

use crate::crypto::{CryptoError, Decryptor};
use crate::session::Session;
use crate::Secret;
use std::sync::Arc;
use tracing::debug;

/// Key used to decrypt a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityKey(Secret);

impl IdentityKey {
    /// Use a value verbatim as the key
    pub fn new(value: impl Into<String>) -> Self {
        Self(Secret::new(value))
    }

    /// Derive the key for an email address
    pub fn from_email(email: &str) -> Self {
        Self::new(normalize_email(email))
    }

    /// Expose the key value
    pub fn expose(&self) -> &str {
        self.0.expose()
    }
}

/// Remove every character outside `[A-Za-z0-9]`
pub fn normalize_email(email: &str) -> String {
    email.chars().filter(char::is_ascii_alphanumeric).collect()
}

/// A bearer token decrypted from a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedCredential {
    bearer_token: Secret,
}

impl DerivedCredential {
    pub fn new(bearer_token: impl Into<String>) -> Self {
        Self {
            bearer_token: Secret::new(bearer_token),
        }
    }

    /// The plaintext bearer token
    pub fn bearer_token(&self) -> &str {
        self.bearer_token.expose()
    }
}

/// A way of choosing the identity key for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The wallet address, verbatim
    WalletAddress,
    /// The email with non-alphanumerics stripped
    NormalizedEmail,
}

impl KeyStrategy {
    /// Evaluation order. Later entries override earlier ones.
    pub const ORDER: [KeyStrategy; 2] = [KeyStrategy::WalletAddress, KeyStrategy::NormalizedEmail];

    /// The key this strategy yields for a session, if its precondition holds
    ///
    /// Every strategy requires a non-empty encrypted token.
    pub fn identity_key(&self, session: &Session) -> Option<IdentityKey> {
        session.token()?;
        match self {
            KeyStrategy::WalletAddress => session.wallet_address().map(IdentityKey::new),
            KeyStrategy::NormalizedEmail => session.email().map(IdentityKey::from_email),
        }
    }
}

impl std::fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyStrategy::WalletAddress => write!(f, "wallet_address"),
            KeyStrategy::NormalizedEmail => write!(f, "email"),
        }
    }
}

/// Derives bearer credentials from sessions
#[derive(Clone)]
pub struct CredentialDeriver {
    decryptor: Arc<dyn Decryptor>,
}

impl CredentialDeriver {
    pub fn new(decryptor: Arc<dyn Decryptor>) -> Self {
        Self { decryptor }
    }

    /// Derive the credential for a session
    ///
    /// Strategies run in [`KeyStrategy::ORDER`] and every applicable one
    /// decrypts the token. The last applicable strategy wins, so a session
    /// carrying both a wallet address and an email is keyed by the email.
    /// A decryption failure in any strategy aborts derivation.
    pub async fn derive(&self, session: &Session) -> Result<Option<DerivedCredential>, CryptoError> {
        if !session.is_eligible() {
            return Ok(None);
        }
        let Some(token) = session.token() else {
            return Ok(None);
        };

        let mut current = None;
        for strategy in KeyStrategy::ORDER {
            let Some(key) = strategy.identity_key(session) else {
                continue;
            };

            let bearer = self.decryptor.decrypt(token, &key).await?;
            debug!(strategy = %strategy, "Derived bearer credential");

            // Intentional overwrite: the last applicable strategy wins
            current = Some(DerivedCredential::new(bearer));
        }

        Ok(current)
    }
}
