//! The per-route proxy filter.
//!
//! # Data Flow
//! ```text
//! Inbound request:
//!     → prefix match        (miss: pass to next handler)
//!     → secret header match (miss: pass to next handler)
//!     → rate limiter        (reject: synthesized 429)
//!     → forward to target   (body reconstructed, Host rewritten,
//!                            extra headers applied)
//!     → response tee        (client bytes first, logging on the side)
//!     → error mapping       (synthesized 500 while headers unsent)
//! ```
//!
//! # Design Decisions
//! - One filter value per configured route; no inheritance, per-route
//!   behavior is configuration, not subclassing
//! - Route mismatches are not errors: control passes through unchanged,
//!   without consuming rate-limit budget
//! - The upstream client is built once per route and shared

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::extract::{ConnectInfo, State};
use axum::http::uri::{Authority, Scheme};
use axum::http::{header, HeaderName, HeaderValue, Request, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::time::Instant;

use crate::config::RouteConfig;
use crate::security::rate_limit::{FixedWindowLimiter, Verdict};
use crate::util::json;

pub mod body;
pub mod error;
pub mod logging;
pub mod tls;

pub use body::InFlightRequest;
pub use error::ProxyError;

const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests, please try again later.";

/// Forwarding pipeline for one configured route.
pub struct ProxyFilter {
    config: RouteConfig,
    scheme: Scheme,
    authority: Authority,
    limiter: Option<FixedWindowLimiter>,
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

/// Axum middleware entry point; mounted once per route.
pub async fn proxy_filter(
    State(filter): State<Arc<ProxyFilter>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    filter.handle(addr, request, next).await
}

impl ProxyFilter {
    pub fn new(config: RouteConfig) -> Result<Self, ProxyError> {
        let uri: Uri = config
            .target
            .parse()
            .map_err(|_| ProxyError::InvalidTarget {
                target: config.target.clone(),
            })?;
        let (scheme, authority) = match (uri.scheme().cloned(), uri.authority().cloned()) {
            (Some(scheme), Some(authority)) => (scheme, authority),
            _ => {
                return Err(ProxyError::InvalidTarget {
                    target: config.target.clone(),
                })
            }
        };

        // surface malformed extra headers at startup, not per request
        for entry in &config.extra_headers {
            parse_extra_header(entry)?;
        }

        let client = Client::builder(TokioExecutor::new())
            .build(tls::build_connector(config.allow_insecure_tls));
        let limiter = config.rate_limit.map(FixedWindowLimiter::new);

        Ok(Self {
            config,
            scheme,
            authority,
            limiter,
            client,
        })
    }

    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Run one request through the route pipeline.
    ///
    /// A prefix or header mismatch delegates to `next`; everything else is
    /// answered here, either with the upstream response or a synthesized one.
    pub async fn handle(
        &self,
        client_addr: SocketAddr,
        request: Request<Body>,
        next: Next,
    ) -> Response {
        let route = self.config.name.as_str();

        if let Some(prefix) = self.config.url_prefix.as_deref() {
            if !request.uri().path().starts_with(prefix) {
                tracing::info!(
                    route = %route,
                    prefix = %prefix,
                    path = %request.uri().path(),
                    "url prefix not matched, passing through"
                );
                return next.run(request).await;
            }
        }

        let presented = request
            .headers()
            .get(self.config.header_key.as_str())
            .and_then(|v| v.to_str().ok());
        if presented != Some(self.config.header_value.as_str()) {
            tracing::info!(
                route = %route,
                header = %self.config.header_key,
                headers = %json::stringify_headers(request.headers()),
                "selector header not matched, passing through"
            );
            return next.run(request).await;
        }

        if let Some(limiter) = &self.limiter {
            let verdict = limiter.check(client_addr.ip());
            if !verdict.allowed {
                tracing::warn!(
                    route = %route,
                    client = %client_addr.ip(),
                    "rate limit exceeded"
                );
                return too_many_requests(&verdict);
            }
        }

        match self.forward(request).await {
            Ok(response) => response,
            Err(err) => error::log_and_respond(route, &self.config.target, &err),
        }
    }

    /// Forward the request to the configured target and hand back the
    /// upstream response wrapped in the logging tee.
    async fn forward(&self, request: Request<Body>) -> Result<Response, ProxyError> {
        let deadline = Instant::now() + Duration::from_millis(self.config.timeout_ms);

        let (parts, inbound_body) = request.into_parts();
        let raw_body = to_bytes(inbound_body, usize::MAX)
            .await
            .map_err(ProxyError::RequestBody)?;
        let inflight = InFlightRequest::capture(parts.method, parts.uri, parts.headers, raw_body);

        let forward_path = self.forward_path_and_query(&inflight.uri);
        logging::log_request(&self.config, &inflight, &forward_path);

        let payload = inflight.reconstruct();

        let uri = Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(forward_path.clone())
            .build()?;
        let mut upstream = Request::builder()
            .method(inflight.method.clone())
            .uri(uri)
            .body(match &payload {
                Some(bytes) => Body::from(bytes.clone()),
                None => Body::empty(),
            })?;

        let headers = upstream.headers_mut();
        for (name, value) in &inflight.headers {
            headers.insert(name.clone(), value.clone());
        }
        // the upstream sees its own host, and a length matching the
        // reconstructed payload rather than the original wire bytes
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        if let Ok(host) = HeaderValue::from_str(self.authority.as_str()) {
            headers.insert(header::HOST, host);
        }
        if let Some(bytes) = &payload {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        }
        for entry in &self.config.extra_headers {
            if let Ok((name, value)) = parse_extra_header(entry) {
                headers.insert(name, value);
            }
        }

        let response = tokio::time::timeout_at(deadline, self.client.request(upstream))
            .await
            .map_err(|_| ProxyError::Timeout(self.config.timeout_ms))??;

        let (response_parts, incoming) = response.into_parts();
        let capture = self.config.log_response.then_some(self.config.buffer_bytes);
        let (tee, completed) = logging::TeeBody::new(
            incoming,
            deadline,
            capture,
            self.config.timeout_ms,
            self.config.name.clone(),
            self.config.target.clone(),
        );
        if let Some(receiver) = completed {
            logging::spawn_response_log(
                &self.config,
                inflight.method.clone(),
                forward_path,
                response_parts.headers.clone(),
                receiver,
            );
        }

        Ok(Response::from_parts(response_parts, Body::new(tee)))
    }

    /// Path (plus query) the upstream sees, honoring prefix stripping.
    fn forward_path_and_query(&self, uri: &Uri) -> String {
        let path = uri.path();
        let stripped = match (&self.config.url_prefix, self.config.remove_prefix_on_forward) {
            (Some(prefix), true) => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            _ => path,
        };
        let mut out = if stripped.starts_with('/') {
            stripped.to_string()
        } else {
            format!("/{stripped}")
        };
        if let Some(query) = uri.query() {
            out.push('?');
            out.push_str(query);
        }
        out
    }
}

fn parse_extra_header(entry: &str) -> Result<(HeaderName, HeaderValue), ProxyError> {
    let bad = || ProxyError::BadExtraHeader {
        entry: entry.to_string(),
    };
    let (name, value) = entry.split_once(':').ok_or_else(bad)?;
    let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| bad())?;
    let value = HeaderValue::from_str(value.trim()).map_err(|_| bad())?;
    Ok((name, value))
}

/// Synthesized 429 with the standard rate-limit headers.
fn too_many_requests(verdict: &Verdict) -> Response {
    let body = error::StatusMessage {
        status_code: 429,
        message: TOO_MANY_REQUESTS_MESSAGE.to_string(),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let reset_secs = verdict.reset_after.as_secs_f64().ceil() as u64;
    let headers = response.headers_mut();
    headers.insert("ratelimit-limit", HeaderValue::from(verdict.limit));
    headers.insert("ratelimit-remaining", HeaderValue::from(verdict.remaining));
    headers.insert("ratelimit-reset", HeaderValue::from(reset_secs));
    response
}
