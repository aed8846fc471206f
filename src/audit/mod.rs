//! Audit trail for forwarded requests
//!
//! One record per successfully prepared request, emitted after the outbound
//! headers are built and before the upstream call.

use crate::credential::OutboundHeaders;
use serde::Serialize;
use tracing::info;

/// What the gateway is about to forward
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Headers injected by the gateway
    pub headers: OutboundHeaders,
    /// Inbound path and query
    pub url: String,
}

/// Receives audit records
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Emits audit records as JSON through `tracing`
#[derive(Debug, Clone)]
pub struct TracingAuditSink {
    redact_credentials: bool,
}

impl TracingAuditSink {
    pub fn new(redact_credentials: bool) -> Self {
        Self { redact_credentials }
    }

    /// The JSON line written for a record
    pub fn render(&self, record: &AuditRecord) -> String {
        let rendered = if self.redact_credentials {
            serde_json::to_string(&AuditRecord {
                headers: record.headers.redacted(),
                url: record.url.clone(),
            })
        } else {
            serde_json::to_string(record)
        };

        rendered.unwrap_or_else(|e| format!("{{\"error\":\"unserializable audit record: {}\"}}", e))
    }
}

impl Default for TracingAuditSink {
    fn default() -> Self {
        Self::new(true)
    }
}

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(target: "keygate::audit", record = %self.render(record), "Forwarding request");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{DerivedCredential, HeaderBuilder};

    fn record() -> AuditRecord {
        AuditRecord {
            headers: HeaderBuilder::build(Some(&DerivedCredential::new("tok123"))),
            url: "/api/users/5?x=1".to_string(),
        }
    }

    #[test]
    fn test_record_shape() {
        let sink = TracingAuditSink::new(false);
        assert_eq!(
            sink.render(&record()),
            r#"{"headers":{"Authorization":"Bearer tok123"},"url":"/api/users/5?x=1"}"#
        );
    }

    #[test]
    fn test_redacted_record() {
        let sink = TracingAuditSink::new(true);
        let line = sink.render(&record());
        assert!(!line.contains("tok123"));
        assert!(line.contains("Bearer [REDACTED]"));
    }

    #[test]
    fn test_anonymous_record() {
        let sink = TracingAuditSink::default();
        let record = AuditRecord {
            headers: OutboundHeaders::new(),
            url: "/api/posts".to_string(),
        };
        assert_eq!(sink.render(&record), r#"{"headers":{},"url":"/api/posts"}"#);
    }
}
