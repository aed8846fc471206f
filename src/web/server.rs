//! Web server implementation using Axum

use crate::audit::TracingAuditSink;
use crate::config::Config;
use crate::credential::CredentialDeriver;
use crate::crypto::AesGcmDecryptor;
use crate::forward::{ForwardError, HttpForwarder};
use crate::server::GatewayHandler;
use crate::session::{HttpSessionResolver, SessionError};
use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

use super::routes;

/// Errors starting the gateway
#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to set up session resolver: {0}")]
    Session(#[from] SessionError),

    #[error("Failed to set up upstream client: {0}")]
    Forwarder(#[from] ForwardError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<GatewayHandler>,
}

/// The gateway HTTP server
pub struct GatewayServer {
    config: Config,
    app_state: AppState,
}

impl GatewayServer {
    /// Create a server around an existing handler
    pub fn new(config: Config, handler: GatewayHandler) -> Self {
        Self {
            config,
            app_state: AppState {
                handler: Arc::new(handler),
            },
        }
    }

    /// Create a server with the default HTTP session resolver, AES-GCM
    /// decryptor, HTTP forwarder and tracing audit sink
    pub fn from_config(config: Config) -> Result<Self, ServeError> {
        let handler = GatewayHandler::new(
            &config,
            Arc::new(HttpSessionResolver::new(&config.session)?),
            CredentialDeriver::new(Arc::new(AesGcmDecryptor::new())),
            Arc::new(HttpForwarder::new(&config.upstream)?),
            Arc::new(TracingAuditSink::new(config.logging.redact_credentials)),
        );

        Ok(Self::new(config, handler))
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let mount = self.config.server.mount_path.as_str();

        Router::new()
            .route("/healthz", get(routes::health))
            .route(mount, any(routes::proxy))
            .route(&format!("{}/", mount), any(routes::proxy))
            .route(&format!("{}/{{*path}}", mount), any(routes::proxy))
            .layer(TraceLayer::new_for_http())
            .with_state(self.app_state.clone())
    }

    /// Run the server
    pub async fn run(self) -> Result<(), ServeError> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(&self.config.server.bind).await?;

        tracing::info!(
            bind = %self.config.server.bind,
            mount = %self.config.server.mount_path,
            upstream = %self.config.upstream.base_url,
            "Starting Keygate gateway"
        );

        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Get the bind address
    pub fn bind_address(&self) -> &str {
        &self.config.server.bind
    }
}
