//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build one ProxyFilter per configured route
//! - Mount the filters as middleware so routes run in declaration order
//! - Answer unmatched traffic with a plain 404
//! - Bind server to listener, serve with graceful shutdown
//!
//! # Design Decisions
//! - Filters are middleware, not routes: a mismatch passes the request on
//!   to the next filter and finally to the fallback
//! - Client address is made available via ConnectInfo for rate limiting

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::filter::{proxy_filter, ProxyError, ProxyFilter};

/// HTTP server hosting the configured proxy routes.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig) -> Result<Self, ProxyError> {
        let router = Self::build_router(&config)?;
        Ok(Self { router, config })
    }

    /// Build the router: fallback first, then one middleware layer per
    /// route. Layers added later run earlier, so routes are added in
    /// reverse to preserve declaration order.
    fn build_router(config: &AppConfig) -> Result<Router, ProxyError> {
        let mut router = Router::new().fallback(unmatched);
        for route in config.routes.iter().rev() {
            let filter = Arc::new(ProxyFilter::new(route.clone())?);
            tracing::info!(
                route = %route.name,
                target = %route.target,
                prefix = route.url_prefix.as_deref().unwrap_or("/"),
                "route mounted"
            );
            router = router.layer(middleware::from_fn_with_state(filter, proxy_filter));
        }
        Ok(router.layer(TraceLayer::new_for_http()))
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Whatever no filter claimed ends here.
async fn unmatched() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "no proxy route matched")
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install Ctrl+C handler");
    }
    tracing::info!("Shutdown signal received");
}
