//! Request forwarding to the upstream API
//!
//! Handles:
//! - The per-request forwarding parameters ([`ForwardSpec`])
//! - Path rewriting before the upstream call
//! - Relaying the upstream response back unchanged

mod http;
mod rewrite;

pub use http::HttpForwarder;
pub use rewrite::{PathRewriteRule, PathRewriter};

use crate::credential::OutboundHeaders;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use url::Url;

/// Forwarding errors
#[derive(Error, Debug)]
pub enum ForwardError {
    #[error("Upstream request failed: {0}")]
    Transport(String),

    #[error("Invalid upstream URL: {0}")]
    InvalidTarget(String),

    #[error("Invalid header {0}")]
    InvalidHeader(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// Headers that describe a single connection and are never relayed
pub static HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Remove hop-by-hop headers, including any named by `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Where and how a request is forwarded
///
/// Built fresh for every request from the immutable upstream configuration
/// and that request's outbound headers. There are no setters.
#[derive(Debug, Clone)]
pub struct ForwardSpec {
    target_base_url: Url,
    rewriter: PathRewriter,
    preserve_host: bool,
    headers: OutboundHeaders,
}

impl ForwardSpec {
    pub fn new(
        target_base_url: Url,
        rewriter: PathRewriter,
        preserve_host: bool,
        headers: OutboundHeaders,
    ) -> Self {
        Self {
            target_base_url,
            rewriter,
            preserve_host,
            headers,
        }
    }

    pub fn target_base_url(&self) -> &Url {
        &self.target_base_url
    }

    pub fn path_rewrite_rules(&self) -> &[PathRewriteRule] {
        self.rewriter.rules()
    }

    /// Keep the inbound `Host` header instead of using the target's
    pub fn preserve_host(&self) -> bool {
        self.preserve_host
    }

    /// Headers the gateway injects, overriding inbound ones
    pub fn headers(&self) -> &OutboundHeaders {
        &self.headers
    }

    /// Rewrite an inbound path for the upstream
    pub fn rewrite_path(&self, path: &str) -> String {
        self.rewriter.rewrite(path)
    }

    /// Full upstream URL for an inbound path and query
    pub fn upstream_url(&self, path: &str, query: Option<&str>) -> Result<Url, ForwardError> {
        let base = self.target_base_url.as_str().trim_end_matches('/');
        let mut target = format!("{}{}", base, self.rewrite_path(path));
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            target.push('?');
            target.push_str(query);
        }

        Url::parse(&target).map_err(|e| ForwardError::InvalidTarget(format!("{}: {}", target, e)))
    }
}

/// An inbound request as handed to the forwarder
#[derive(Debug)]
pub struct ForwardRequest {
    pub method: Method,
    /// Inbound path, before rewriting
    pub path: String,
    pub query: Option<String>,
    /// Inbound headers, relayed minus hop-by-hop headers
    pub headers: HeaderMap,
    /// Raw inbound body, streamed upstream byte for byte
    pub body: Body,
}

/// The upstream's answer, returned to the caller verbatim
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Streamed as the upstream produces it
    pub body: Body,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

/// Transmits a request to the upstream API
#[async_trait]
pub trait RequestForwarder: Send + Sync {
    /// Forward `request` as described by `spec`
    ///
    /// Implementations apply the rewrite rules and host policy it carries.
    /// Upstream error statuses are responses, not errors.
    async fn forward(
        &self,
        request: ForwardRequest,
        spec: &ForwardSpec,
    ) -> Result<UpstreamResponse, ForwardError>;
}
