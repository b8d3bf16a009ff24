//! Passive request/response logging.
//!
//! # Responsibilities
//! - Emit the pre-forward request log line
//! - Tee the upstream response body into a capture buffer while it streams
//!   to the client
//! - Decode gzip-encoded response bodies for log readability only
//!
//! # Design Decisions
//! - The client is never delayed: capture is a copy on the byte path and
//!   decode/logging run on a spawned task after the stream ends
//! - A dropped client connection drops the capture channel; the logging
//!   task then abandons silently
//! - The tee also carries the route deadline so `timeout_ms` bounds the
//!   whole response, not just the head

use std::future::Future;
use std::io::Read;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use axum::http::{header, HeaderMap, Method};
use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, Incoming, SizeHint};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant, Sleep};

use crate::config::RouteConfig;
use crate::filter::body::InFlightRequest;
use crate::filter::error::{self, ProxyError};
use crate::util::json;

/// Pre-forward log line: method, original host/path, forward target, raw and
/// parsed request body, serialized request headers.
pub fn log_request(config: &RouteConfig, request: &InFlightRequest, forward_path: &str) {
    if !config.log_request {
        return;
    }
    let host = request
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    let parsed = request
        .parsed_json
        .as_ref()
        .map(json::stringify)
        .unwrap_or_else(|| "-".to_string());
    tracing::info!(
        route = %config.name,
        method = %request.method,
        host = %host,
        path = %request.uri.path(),
        target = %config.target,
        forward_path = %forward_path,
        raw_body = %String::from_utf8_lossy(&request.raw_body),
        body = %parsed,
        headers = %json::stringify_headers(&request.headers),
        "forwarding request"
    );
}

/// Body wrapper that relays upstream frames to the client while copying
/// data frames into a capture buffer.
///
/// On clean end-of-stream the buffer is handed to the response-log task.
/// A mid-stream upstream error or deadline expiry surfaces as a body error,
/// which aborts the client connection; at that point the response head is
/// long gone, so the failure is logged and never rewritten.
pub struct TeeBody {
    inner: Incoming,
    captured: Option<BytesMut>,
    completed: Option<oneshot::Sender<Bytes>>,
    deadline: Pin<Box<Sleep>>,
    timeout_ms: u64,
    route: String,
    target: String,
}

impl TeeBody {
    /// Wrap an upstream body. `capture_capacity` of `None` disables capture
    /// (no buffering cost when response logging is off).
    pub fn new(
        inner: Incoming,
        deadline: Instant,
        capture_capacity: Option<usize>,
        timeout_ms: u64,
        route: String,
        target: String,
    ) -> (Self, Option<oneshot::Receiver<Bytes>>) {
        let (completed, receiver) = match capture_capacity {
            Some(_) => {
                let (tx, rx) = oneshot::channel();
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };
        (
            Self {
                inner,
                captured: capture_capacity.map(BytesMut::with_capacity),
                completed,
                deadline: Box::pin(sleep_until(deadline)),
                timeout_ms,
                route,
                target,
            },
            receiver,
        )
    }
}

impl Body for TeeBody {
    type Data = Bytes;
    type Error = ProxyError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.deadline.as_mut().poll(cx).is_ready() {
            let err = ProxyError::Timeout(this.timeout_ms);
            error::log_stream_failure(&this.route, &this.target, &err);
            this.completed = None;
            return Poll::Ready(Some(Err(err)));
        }

        match ready!(Pin::new(&mut this.inner).poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let (Some(buffer), Some(data)) = (this.captured.as_mut(), frame.data_ref()) {
                    buffer.extend_from_slice(data);
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                let err = ProxyError::Upstream(e);
                error::log_stream_failure(&this.route, &this.target, &err);
                this.completed = None;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                if let (Some(tx), Some(buffer)) = (this.completed.take(), this.captured.take()) {
                    let _ = tx.send(buffer.freeze());
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Wait for the captured response body and emit the response log line.
///
/// Gzip bodies are decoded first; a decode failure is logged and the body
/// log line is skipped. The client-facing bytes are unaffected either way.
pub fn spawn_response_log(
    config: &RouteConfig,
    method: Method,
    forward_path: String,
    headers: HeaderMap,
    completed: oneshot::Receiver<Bytes>,
) {
    let route = config.name.clone();
    let target = config.target.clone();
    let gzipped = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        == Some("gzip");

    tokio::spawn(async move {
        // a closed channel means the client went away mid-stream
        let Ok(body) = completed.await else {
            return;
        };
        let text = if gzipped {
            match gunzip(&body) {
                Ok(decoded) => String::from_utf8_lossy(&decoded).into_owned(),
                Err(e) => {
                    tracing::error!(
                        route = %route,
                        target = %target,
                        error = %e,
                        "error decoding gzip response body"
                    );
                    return;
                }
            }
        } else {
            String::from_utf8_lossy(&body).into_owned()
        };
        tracing::info!(
            route = %route,
            method = %method,
            target = %target,
            forward_path = %forward_path,
            body = %text,
            headers = %json::stringify_headers(&headers),
            "upstream response"
        );
    });
}

fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoded = Vec::new();
    flate2::read::GzDecoder::new(data).read_to_end(&mut decoded)?;
    Ok(decoded)
}
