//! Gateway request handling
//!
//! Resolves the session, derives the credential, records the audit entry
//! and forwards. This is the only place request errors are caught.

use crate::audit::{AuditRecord, AuditSink};
use crate::config::{Config, UpstreamConfig};
use crate::credential::{CredentialDeriver, HeaderBuilder};
use crate::forward::{ForwardRequest, ForwardSpec, RequestForwarder, UpstreamResponse};
use crate::session::{lookup_session, SessionResolver};
use crate::GatewayError;
use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

/// Message used when an error carries none
const UNKNOWN_ERROR: &str = "Unknown error";

/// Uniform failure response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub status: StatusCode,
    pub error: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl ErrorEnvelope {
    /// A 500 envelope, falling back to "Unknown error" for blank messages
    pub fn internal(message: &str) -> Self {
        let message = message.trim();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: if message.is_empty() {
                UNKNOWN_ERROR.to_string()
            } else {
                message.to_string()
            },
        }
    }
}

impl From<&GatewayError> for ErrorEnvelope {
    fn from(err: &GatewayError) -> Self {
        Self::internal(&err.to_string())
    }
}

impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: &self.error })).into_response()
    }
}

/// An inbound request addressed to the upstream API
#[derive(Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
}

impl InboundRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Body>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
        }
    }
}

impl From<axum::extract::Request> for InboundRequest {
    fn from(request: axum::extract::Request) -> Self {
        let (parts, body) = request.into_parts();
        Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
        }
    }
}

/// The gateway handler
///
/// Holds only immutable configuration and thread-safe collaborators, so one
/// instance serves every request concurrently.
pub struct GatewayHandler {
    upstream: UpstreamConfig,
    sessions: Arc<dyn SessionResolver>,
    deriver: CredentialDeriver,
    forwarder: Arc<dyn RequestForwarder>,
    audit: Arc<dyn AuditSink>,
}

impl GatewayHandler {
    pub fn new(
        config: &Config,
        sessions: Arc<dyn SessionResolver>,
        deriver: CredentialDeriver,
        forwarder: Arc<dyn RequestForwarder>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            upstream: config.upstream.clone(),
            sessions,
            deriver,
            forwarder,
            audit,
        }
    }

    /// Handle one request, returning either the upstream response or the
    /// error envelope
    pub async fn handle(&self, request: InboundRequest) -> Response {
        let span = info_span!(
            "gateway_request",
            request_id = %Uuid::new_v4(),
            method = %request.method,
            path = %request.uri.path(),
        );

        async {
            match self.try_handle(request).await {
                Ok(response) => response.into_response(),
                Err(e) => {
                    warn!(error = %e, "Gateway request failed");
                    ErrorEnvelope::from(&e).into_response()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_handle(&self, request: InboundRequest) -> Result<UpstreamResponse, GatewayError> {
        let InboundRequest {
            method,
            uri,
            headers,
            body,
        } = request;

        let lookup = lookup_session(self.sessions.as_ref(), &headers).await;
        let credential = match lookup.session() {
            Some(session) if session.is_eligible() => self.deriver.derive(session).await?,
            _ => None,
        };

        let outbound = HeaderBuilder::build(credential.as_ref());

        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        self.audit.record(&AuditRecord {
            headers: outbound.clone(),
            url,
        });

        let spec = ForwardSpec::new(
            self.upstream.base_url.clone(),
            self.upstream.rewriter(),
            self.upstream.preserve_host,
            outbound,
        );

        let forward = ForwardRequest {
            method,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers,
            body,
        };

        Ok(self.forwarder.forward(forward, &spec).await?)
    }
}
