//! Keygate - an authenticated API gateway
//!
//! Keygate sits in front of a backend API. For every inbound request it
//! resolves the caller's session, derives a bearer credential by decrypting
//! the session token with an identity-specific key, injects that credential
//! into the forwarded request and relays the upstream response unchanged.

pub mod audit;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod forward;
pub mod server;
pub mod session;
pub mod web;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Errors that abort a single gateway request
///
/// Every variant is fatal to the request and is reported to the caller
/// through the uniform error envelope (see [`server::ErrorEnvelope`]).
/// Session resolution failures are deliberately absent: they degrade to an
/// unauthenticated request instead.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error(transparent)]
    Decryption(#[from] crypto::CryptoError),

    #[error(transparent)]
    Forwarding(#[from] forward::ForwardError),
}

/// A secret string wrapper that redacts itself from `Debug` output
#[derive(Debug, Clone)]
pub struct Secret(SecretString);

impl Secret {
    /// Create a new secret from a string
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// Expose the secret value
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Secret {}
