//! Session data as seen by the gateway

use serde::Deserialize;

/// Identity attributes that can key a session token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Wallet address, used verbatim as a key
    pub wallet_address: Option<String>,
    /// Email address, normalized before use as a key
    pub email: Option<String>,
}

/// A resolved session
///
/// Owned by the external session store; the gateway only reads it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub authenticated: bool,
    pub is_anonymous: bool,
    pub identity: Identity,
    /// Bearer token encrypted with an identity key
    pub encrypted_token: Option<String>,
}

impl Session {
    /// An authenticated, non-anonymous session
    pub fn authenticated(identity: Identity, encrypted_token: Option<String>) -> Self {
        Self {
            authenticated: true,
            is_anonymous: false,
            identity,
            encrypted_token,
        }
    }

    /// Whether credential derivation may be attempted for this session
    pub fn is_eligible(&self) -> bool {
        self.authenticated && !self.is_anonymous
    }

    /// The encrypted token, if present and non-empty
    pub fn token(&self) -> Option<&str> {
        non_empty(self.encrypted_token.as_deref())
    }

    /// The wallet address, if present and non-empty
    pub fn wallet_address(&self) -> Option<&str> {
        non_empty(self.identity.wallet_address.as_deref())
    }

    /// The email, if present and non-empty
    pub fn email(&self) -> Option<&str> {
        non_empty(self.identity.email.as_deref())
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Session document returned by the session endpoint
///
/// An empty object (or `null`) means there is no session.
#[derive(Debug, Deserialize, Default)]
pub struct RawSession {
    pub user: Option<RawSessionUser>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RawSessionUser {
    pub address: Option<String>,
    pub email: Option<String>,
    pub token: Option<String>,
    #[serde(default)]
    pub anonymous: bool,
}

impl RawSession {
    /// Convert into a gateway session, `None` when no user is signed in
    pub fn into_session(self) -> Option<Session> {
        self.user.map(|user| Session {
            authenticated: true,
            is_anonymous: user.anonymous,
            identity: Identity {
                wallet_address: user.address,
                email: user.email,
            },
            encrypted_token: user.token,
        })
    }
}
