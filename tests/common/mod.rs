//! Shared utilities for integration testing.

// each test binary uses a different subset of these helpers
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use relay_gate::config::{AppConfig, RouteConfig};
use relay_gate::http::HttpServer;

/// A mock upstream that records every raw HTTP request it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockUpstream {
    /// Start an upstream answering 200 with a fixed text body.
    pub async fn start(body: &str) -> Self {
        Self::start_with(200, Vec::new(), body.as_bytes().to_vec()).await
    }

    /// Start an upstream with full control over status, extra response
    /// headers, and body bytes.
    pub async fn start_with(
        status: u16,
        extra_headers: Vec<(String, String)>,
        body: Vec<u8>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<Vec<u8>>>> = Arc::default();
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let recorded = recorded.clone();
                let extra_headers = extra_headers.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    serve_one(socket, status, extra_headers, body, recorded).await;
                });
            }
        });

        Self { addr, requests }
    }

    pub fn target(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Recorded requests as lossy text (head + body).
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|raw| String::from_utf8_lossy(raw).into_owned())
            .collect()
    }

    /// Body bytes of the nth recorded request.
    pub fn request_body(&self, n: usize) -> Vec<u8> {
        let raw = self.requests.lock().unwrap()[n].clone();
        let head_end = find_subslice(&raw, b"\r\n\r\n").expect("recorded request has no head");
        raw[head_end + 4..].to_vec()
    }
}

async fn serve_one(
    mut socket: TcpStream,
    status: u16,
    extra_headers: Vec<(String, String)>,
    body: Vec<u8>,
    recorded: Arc<Mutex<Vec<Vec<u8>>>>,
) {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];

    // read the head, then exactly content-length body bytes
    let expected_len = loop {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            return;
        }
        raw.extend_from_slice(&chunk[..n]);
        if let Some(head_end) = find_subslice(&raw, b"\r\n\r\n") {
            break head_end + 4 + content_length(&raw[..head_end]);
        }
    };
    while raw.len() < expected_len {
        let Ok(n) = socket.read(&mut chunk).await else {
            return;
        };
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    recorded.lock().unwrap().push(raw);

    let status_text = match status {
        200 => "200 OK",
        404 => "404 Not Found",
        429 => "429 Too Many Requests",
        500 => "500 Internal Server Error",
        _ => "200 OK",
    };
    let mut response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status_text,
        body.len()
    );
    for (name, value) in extra_headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.write_all(&body).await;
    let _ = socket.shutdown().await;
}

fn content_length(head: &[u8]) -> usize {
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();
    head.lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Route config with test defaults: secret header "secret", logging on.
pub fn route(name: &str, target: String) -> RouteConfig {
    RouteConfig {
        name: name.to_string(),
        target,
        header_key: "x-reverse-proxy".to_string(),
        header_value: "secret".to_string(),
        url_prefix: None,
        remove_prefix_on_forward: false,
        extra_headers: Vec::new(),
        rate_limit: None,
        timeout_ms: 5_000,
        buffer_bytes: 16 * 1024,
        allow_insecure_tls: false,
        log_request: true,
        log_response: true,
    }
}

/// Spawn the proxy on an ephemeral port and return its address.
pub async fn spawn_proxy(routes: Vec<RouteConfig>) -> SocketAddr {
    let config = AppConfig {
        routes,
        ..AppConfig::default()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });
    addr
}

/// Non-pooled client that ignores any ambient proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// An address nothing is listening on.
pub async fn unreachable_target() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
