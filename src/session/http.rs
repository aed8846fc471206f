//! Session resolution against an HTTP session endpoint

use super::{RawSession, Session, SessionError, SessionResolver};
use crate::config::SessionConfig;
use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName};
use reqwest::{Client, Url};
use std::time::Duration;

/// Resolves sessions by asking the application's session endpoint
///
/// The configured identifying headers (usually just `cookie`) are copied
/// from the inbound request; the endpoint answers with the session
/// document, or `{}` when nobody is signed in.
pub struct HttpSessionResolver {
    client: Client,
    endpoint: Url,
    forward_headers: Vec<HeaderName>,
}

impl HttpSessionResolver {
    /// Create a resolver from the session configuration
    pub fn new(config: &SessionConfig) -> Result<Self, SessionError> {
        let client = Client::builder()
            .user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            forward_headers: config.forward_headers.clone(),
        })
    }
}

#[async_trait]
impl SessionResolver for HttpSessionResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<Option<Session>, SessionError> {
        let mut request = self.client.get(self.endpoint.clone());
        let mut identifying = false;

        for name in &self.forward_headers {
            for value in headers.get_all(name) {
                request = request.header(name, value);
                identifying = true;
            }
        }

        // Nothing to identify the caller with, so there is no session to find
        if !identifying {
            return Ok(None);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;

        let raw: Option<RawSession> = serde_json::from_slice(&body)
            .map_err(|e| SessionError::InvalidDocument(e.to_string()))?;

        Ok(raw.and_then(RawSession::into_session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderValue};
    use wiremock::matchers::{header as match_header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn resolver_for(server: &MockServer) -> HttpSessionResolver {
        let config = SessionConfig {
            endpoint: Url::parse(&format!("{}/api/auth/session", server.uri())).unwrap(),
            forward_headers: vec![header::COOKIE],
            timeout_secs: 5,
        };
        HttpSessionResolver::new(&config).unwrap()
    }

    fn cookie_headers(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_resolves_session_with_cookie() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/auth/session"))
            .and(match_header("cookie", "session-token=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user": { "address": "0xabc", "token": "s:n:c" },
                "expires": "2030-01-01T00:00:00.000Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = resolver_for(&server)
            .resolve(&cookie_headers("session-token=abc"))
            .await
            .unwrap()
            .unwrap();

        assert!(session.is_eligible());
        assert_eq!(session.wallet_address(), Some("0xabc"));
    }

    #[tokio::test]
    async fn test_empty_document_means_no_session() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let session = resolver_for(&server)
            .resolve(&cookie_headers("other=1"))
            .await
            .unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_no_cookie_skips_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let session = resolver_for(&server).resolve(&HeaderMap::new()).await.unwrap();
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = resolver_for(&server)
            .resolve(&cookie_headers("session-token=abc"))
            .await;
        assert!(matches!(result, Err(SessionError::Status(502))));
    }

    #[tokio::test]
    async fn test_malformed_document_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let result = resolver_for(&server)
            .resolve(&cookie_headers("session-token=abc"))
            .await;
        assert!(matches!(result, Err(SessionError::InvalidDocument(_))));
    }
}
