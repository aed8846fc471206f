//! Upstream forwarding over HTTP

use super::{strip_hop_by_hop, ForwardError, ForwardRequest, ForwardSpec, RequestForwarder, UpstreamResponse};
use crate::config::UpstreamConfig;
use async_trait::async_trait;
use axum::body::{Body, HttpBody};
use axum::http::{header, HeaderName, HeaderValue};
use reqwest::{redirect, Client};
use std::time::Duration;

/// Forwards requests with a shared `reqwest` client
///
/// Redirects are not followed; they are relayed to the caller like any
/// other upstream response.
pub struct HttpForwarder {
    client: Client,
}

impl HttpForwarder {
    /// Create a forwarder from the upstream configuration
    pub fn new(config: &UpstreamConfig) -> Result<Self, ForwardError> {
        let mut builder = Client::builder().redirect(redirect::Policy::none());
        if let Some(timeout) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        let client = builder
            .build()
            .map_err(|e| ForwardError::Client(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl RequestForwarder for HttpForwarder {
    async fn forward(
        &self,
        request: ForwardRequest,
        spec: &ForwardSpec,
    ) -> Result<UpstreamResponse, ForwardError> {
        let url = spec.upstream_url(&request.path, request.query.as_deref())?;

        let mut headers = request.headers;
        strip_hop_by_hop(&mut headers);
        // The client frames the streamed body itself
        headers.remove(header::CONTENT_LENGTH);
        if !spec.preserve_host() {
            headers.remove(header::HOST);
        }

        for (name, value) in spec.headers().iter() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ForwardError::InvalidHeader(format!("name {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ForwardError::InvalidHeader(format!("value for {}: {}", name, e)))?;
            headers.insert(name, value);
        }

        tracing::debug!(method = %request.method, upstream = %url, "Forwarding upstream");

        let mut upstream = self.client.request(request.method, url).headers(headers);
        // Known-empty bodies are sent without chunked framing
        if request.body.size_hint().exact() != Some(0) {
            upstream = upstream.body(reqwest::Body::wrap_stream(request.body.into_data_stream()));
        }

        let response = upstream
            .send()
            .await
            .map_err(|e| ForwardError::Transport(e.to_string()))?;

        Ok(UpstreamResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: Body::from_stream(response.bytes_stream()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{DerivedCredential, HeaderBuilder, OutboundHeaders};
    use crate::forward::PathRewriter;
    use axum::http::{HeaderMap, Method, StatusCode};
    use http_body_util::BodyExt;
    use url::Url;
    use wiremock::matchers::{body_bytes, header as match_header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn forwarder() -> HttpForwarder {
        HttpForwarder::new(&UpstreamConfig::default()).unwrap()
    }

    fn spec_for(server: &MockServer, preserve_host: bool, headers: OutboundHeaders) -> ForwardSpec {
        ForwardSpec::new(
            Url::parse(&server.uri()).unwrap(),
            PathRewriter::strip_api_prefix(),
            preserve_host,
            headers,
        )
    }

    fn request(method: Method, path: &str, query: Option<&str>, body: &'static [u8]) -> ForwardRequest {
        ForwardRequest {
            method,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers: HeaderMap::new(),
            body: Body::from(body),
        }
    }

    async fn body_text(response: UpstreamResponse) -> String {
        let bytes = response.body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_forwards_rewritten_path_with_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/users/5"))
            .and(query_param("fields", "name"))
            .and(match_header("authorization", "Bearer tok123"))
            .and(body_bytes(b"{\"raw\": true}".to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let headers = HeaderBuilder::build(Some(&DerivedCredential::new("tok123")));
        let response = forwarder()
            .forward(
                request(Method::POST, "/api/users/5", Some("fields=name"), b"{\"raw\": true}"),
                &spec_for(&server, false, headers),
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(body_text(response).await, "created");
    }

    #[tokio::test]
    async fn test_gateway_header_overrides_inbound_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(match_header("authorization", "Bearer derived"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut inbound = request(Method::GET, "/api/me", None, b"");
        inbound
            .headers
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer forged"));

        let headers = HeaderBuilder::build(Some(&DerivedCredential::new("derived")));
        let response = forwarder()
            .forward(inbound, &spec_for(&server, false, headers))
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_host_header_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(|req: &Request| {
                let host = req
                    .headers
                    .get("host")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                ResponseTemplate::new(200).set_body_string(host)
            })
            .mount(&server)
            .await;

        let inbound = || {
            let mut inbound = request(Method::GET, "/api/x", None, b"");
            inbound
                .headers
                .insert(header::HOST, HeaderValue::from_static("app.example.com"));
            inbound
        };

        let rewritten = forwarder()
            .forward(inbound(), &spec_for(&server, false, OutboundHeaders::new()))
            .await
            .unwrap();
        assert_ne!(body_text(rewritten).await, "app.example.com");

        let preserved = forwarder()
            .forward(inbound(), &spec_for(&server, true, OutboundHeaders::new()))
            .await
            .unwrap();
        assert_eq!(body_text(preserved).await, "app.example.com");
    }

    #[tokio::test]
    async fn test_upstream_errors_are_responses() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such user"))
            .mount(&server)
            .await;

        let response = forwarder()
            .forward(
                request(Method::DELETE, "/api/users/9", None, b""),
                &spec_for(&server, false, OutboundHeaders::new()),
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "no such user");
    }

    #[tokio::test]
    async fn test_streams_large_bodies_both_ways() {
        let payload = vec![b'x'; 12 * 1024 * 1024];
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(body_bytes(payload.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let mut inbound = request(Method::POST, "/api/upload", None, b"");
        inbound.body = Body::from(payload.clone());

        let response = forwarder()
            .forward(inbound, &spec_for(&server, false, OutboundHeaders::new()))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        let relayed = response.body.collect().await.unwrap().to_bytes();
        assert_eq!(relayed.len(), payload.len());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let spec = ForwardSpec::new(
            Url::parse("http://127.0.0.1:9").unwrap(),
            PathRewriter::strip_api_prefix(),
            false,
            OutboundHeaders::new(),
        );

        let result = forwarder()
            .forward(request(Method::GET, "/api/x", None, b""), &spec)
            .await;
        assert!(matches!(result, Err(ForwardError::Transport(_))));
    }
}
