//! Outbound header construction

use super::DerivedCredential;
use serde::Serialize;
use std::collections::BTreeMap;

/// Header name carrying the derived credential
pub const AUTHORIZATION: &str = "Authorization";

/// Headers the gateway adds to a forwarded request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OutboundHeaders(BTreeMap<String, String>);

impl OutboundHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Copy with credential values masked, for logging
    pub fn redacted(&self) -> Self {
        let mut headers = self.0.clone();
        if let Some(value) = headers.get_mut(AUTHORIZATION) {
            *value = match value.split_once(' ') {
                Some((scheme, _)) => format!("{} [REDACTED]", scheme),
                None => "[REDACTED]".to_string(),
            };
        }
        Self(headers)
    }
}

/// Builds the outbound header set from a derived credential
pub struct HeaderBuilder;

impl HeaderBuilder {
    /// `Authorization: Bearer <token>` for a credential, nothing otherwise
    pub fn build(credential: Option<&DerivedCredential>) -> OutboundHeaders {
        let mut headers = BTreeMap::new();
        if let Some(credential) = credential {
            headers.insert(
                AUTHORIZATION.to_string(),
                format!("Bearer {}", credential.bearer_token()),
            );
        }
        OutboundHeaders(headers)
    }
}
