//! Forwarding failures and their client-visible mapping.
//!
//! # Design Decisions
//! - One synthesized 500 per failed request, and only if the response head
//!   has not already reached the client
//! - Failures below the HTTP boundary (gzip decode, logging) never surface
//!   to the client and are not represented here
//! - No automatic retries anywhere

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while building a filter or forwarding a request.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid upstream target '{target}'")]
    InvalidTarget { target: String },

    #[error("extra header '{entry}' is not a valid 'key: value' pair")]
    BadExtraHeader { entry: String },

    #[error("failed to read request body: {0}")]
    RequestBody(axum::Error),

    #[error("failed to build upstream request: {0}")]
    BuildRequest(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Connect(#[from] hyper_util::client::legacy::Error),

    #[error("upstream response failed: {0}")]
    Upstream(#[from] hyper::Error),

    #[error("upstream timed out after {0} ms")]
    Timeout(u64),
}

/// JSON body of the synthesized 429 and 500 responses.
#[derive(Debug, Serialize)]
pub struct StatusMessage {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub message: String,
}

/// Log a failure that happened after the response head reached the client.
///
/// The stream is already committed, so there is nothing to synthesize; the
/// body error aborts the connection and this line is the only trace.
pub fn log_stream_failure(route: &str, target: &str, err: &ProxyError) {
    tracing::error!(route = %route, target = %target, error = %err, "proxy forwarding failed");
}

/// Log a forwarding failure and synthesize the client-visible 500.
///
/// Only valid before the response head is sent; mid-stream failures go
/// through [`log_stream_failure`] instead.
pub fn log_and_respond(route: &str, target: &str, err: &ProxyError) -> Response {
    tracing::error!(route = %route, target = %target, error = %err, "proxy forwarding failed");
    tracing::error!(
        route = %route,
        target = %target,
        headers_sent = false,
        status = 500,
        error = %err,
        "returning synthesized error response"
    );
    let body = StatusMessage {
        status_code: 500,
        message: err.to_string(),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
