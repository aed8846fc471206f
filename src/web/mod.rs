//! HTTP surface for Keygate
//!
//! Mounts the gateway under the configured path prefix and exposes a
//! health check.

mod routes;
mod server;

pub use server::{AppState, GatewayServer, ServeError};
