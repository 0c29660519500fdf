//! Transport layer for the gateway.
//!
//! - `routes`: the axum router and handlers
//! - `http`: the listener with graceful shutdown

pub mod http;
pub mod routes;

pub use http::HttpTransport;
pub use routes::router;

use crate::error::GatewayResult;
use std::future::Future;

/// A way of serving the gateway to clients.
pub trait Transport: Send + Sync {
    /// Serve until shutdown.
    ///
    /// This method should block until the transport is shut down.
    fn run(&self) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Get the name of this transport for logging.
    fn name(&self) -> &'static str;
}
