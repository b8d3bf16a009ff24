//! HTTP server subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, per-route filter layers)
//!     → filter chain in route declaration order
//!     → unmatched traffic falls through to the 404 handler
//! ```

pub mod server;

pub use server::HttpServer;
