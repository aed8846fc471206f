//! Session resolution
//!
//! The session store is external. The gateway asks a [`SessionResolver`]
//! for the caller's session and treats any failure as "no session".

mod http;
mod types;

pub use http::HttpSessionResolver;
pub use types::{Identity, RawSession, RawSessionUser, Session};

use async_trait::async_trait;
use axum::http::HeaderMap;
use thiserror::Error;
use tracing::warn;

/// Session resolution errors
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Session endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Session endpoint returned status {0}")]
    Status(u16),

    #[error("Invalid session document: {0}")]
    InvalidDocument(String),
}

/// Resolves the session that an inbound request belongs to
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve from the inbound request headers (cookies, tokens)
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, SessionError>;
}

/// Outcome of a session lookup
///
/// There is no error variant: resolver failures degrade to `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
    Found(Session),
    Absent,
}

impl SessionLookup {
    /// The session, if one was found
    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionLookup::Found(session) => Some(session),
            SessionLookup::Absent => None,
        }
    }
}

/// Look up the session for a request, swallowing resolver failures
pub async fn lookup_session(resolver: &dyn SessionResolver, headers: &HeaderMap) -> SessionLookup {
    match resolver.resolve(headers).await {
        Ok(Some(session)) => SessionLookup::Found(session),
        Ok(None) => SessionLookup::Absent,
        Err(e) => {
            warn!(error = %e, "Session resolution failed, continuing unauthenticated");
            SessionLookup::Absent
        }
    }
}
