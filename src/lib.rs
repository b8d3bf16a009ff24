//! Header-gated reverse proxy filter library.
//!
//! Each configured route inspects inbound requests (path prefix plus a
//! shared-secret header), rate-limits per client, forwards to one fixed
//! upstream target, and passively logs the request/response pair.

pub mod config;
pub mod filter;
pub mod http;
pub mod security;
pub mod util;

pub use config::AppConfig;
pub use config::RouteConfig;
pub use filter::ProxyFilter;
pub use http::HttpServer;
