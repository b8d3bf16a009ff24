//! Request capture and body reconstruction.
//!
//! # Responsibilities
//! - Hold the per-request context the filter reads (method, headers, raw
//!   body bytes, parsed JSON body, URL)
//! - Regenerate wire-compatible body bytes for the upstream request
//!
//! # Design Decisions
//! - The inbound body is buffered and parsed for inspection before
//!   forwarding, so the reconstructor regenerates bytes instead of
//!   replaying a stream
//! - Form-urlencoded payloads are always the original raw bytes, never a
//!   re-encoded form
//! - Multipart uploads are forwarded only after the full body is in memory

use axum::http::{header, HeaderMap, Method, Uri};
use bytes::Bytes;
use serde_json::Value;

use crate::util::json;

/// Ephemeral context for one request being forwarded. Owned by a single
/// request's pipeline and never shared.
pub struct InFlightRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub raw_body: Bytes,
    pub parsed_json: Option<Value>,
}

impl InFlightRequest {
    /// Capture the request once its body has been fully read.
    ///
    /// A JSON content type triggers an inspection parse; a body that fails
    /// to parse is treated as absent for reconstruction purposes.
    pub fn capture(method: Method, uri: Uri, headers: HeaderMap, raw_body: Bytes) -> Self {
        let content_type = lowercase_content_type(&headers);
        let parsed_json = if content_type.contains("json") && !raw_body.is_empty() {
            serde_json::from_slice(&raw_body).ok()
        } else {
            None
        };
        Self {
            method,
            uri,
            headers,
            raw_body,
            parsed_json,
        }
    }

    pub fn content_type(&self) -> String {
        lowercase_content_type(&self.headers)
    }

    /// Regenerate the payload to send upstream, keyed on method and
    /// `Content-Type`. `None` means the request is forwarded without a body.
    pub fn reconstruct(&self) -> Option<Bytes> {
        if self.method == Method::GET || self.raw_body.is_empty() {
            return None;
        }

        let content_type = self.content_type();
        if content_type.contains("json") {
            // re-serialized from the parsed value; an unparseable body
            // counts as no body at all
            self.parsed_json
                .as_ref()
                .map(|value| Bytes::from(json::stringify(value)))
        } else if content_type.contains("x-www-form-urlencoded") {
            Some(self.raw_body.clone())
        } else if content_type.contains("multipart/form-data") {
            // already fully buffered by capture(); sent as one write
            Some(self.raw_body.clone())
        } else {
            // unsupported content types lose their payload; kept for
            // compatibility with the previous behavior
            tracing::warn!(
                content_type = %content_type,
                "unsupported content type, request body dropped"
            );
            None
        }
    }
}

fn lowercase_content_type(headers: &HeaderMap) -> String {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase()
}
