//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use relay_proxy::intercept::MemorySink;
use relay_proxy::{HttpServer, ProxyConfig, Shutdown};

/// What a mock upstream saw.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A mock upstream that records every request and answers with a fixed
/// status, body and extra headers.
pub struct RecordingBackend {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl RecordingBackend {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }

    pub fn hits(&self) -> usize {
        self.captured.lock().unwrap().len()
    }
}

pub async fn start_recording_backend(
    status: u16,
    body: &'static str,
    headers: &'static [(&'static str, &'static str)],
) -> RecordingBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let captured = Arc::new(Mutex::new(Vec::new()));

    let sink = captured.clone();
    let app = Router::new().fallback(move |request: Request<Body>| {
        let sink = sink.clone();
        async move {
            let (parts, payload) = request.into_parts();
            let payload = payload.collect().await.unwrap().to_bytes();
            sink.lock().unwrap().push(CapturedRequest {
                method: parts.method.to_string(),
                uri: parts.uri.to_string(),
                headers: parts.headers,
                body: payload,
            });

            let mut response: Response =
                (StatusCode::from_u16(status).unwrap(), body).into_response();
            for (name, value) in headers {
                response
                    .headers_mut()
                    .insert(*name, value.parse().unwrap());
            }
            response
        }
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    RecordingBackend { addr, captured }
}

/// Bind and immediately release a port so connections to it are refused.
pub async fn unreachable_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Read until the end of the request head.
async fn read_head(socket: &mut TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Start a raw backend that answers `200 ok` and counts accepted
/// connections and the bytes read from them.
pub async fn start_counting_backend() -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let connections = Arc::new(AtomicUsize::new(0));
    let bytes = Arc::new(AtomicUsize::new(0));

    let (conn_count, byte_count) = (connections.clone(), bytes.clone());
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            conn_count.fetch_add(1, Ordering::SeqCst);
            let byte_count = byte_count.clone();
            tokio::spawn(async move {
                let mut chunk = [0u8; 4096];
                if let Ok(n) = socket.read(&mut chunk).await {
                    byte_count.fetch_add(n, Ordering::SeqCst);
                }
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                    .await;
            });
        }
    });

    (addr, connections, bytes)
}

/// Start a raw backend that waits `delay` before answering `200 slow`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                tokio::time::sleep(delay).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\nslow")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start a raw backend that never answers and reports, for each
/// connection, how long after the request arrived the proxy hung up.
pub async fn start_hanging_backend() -> (SocketAddr, mpsc::UnboundedReceiver<Duration>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let received = Instant::now();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(_) => continue,
                    }
                }
                let _ = tx.send(received.elapsed());
            });
        }
    });

    (addr, rx)
}

/// Start a raw backend that promises 100 bytes, sends 10, and hangs up.
pub async fn start_truncating_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                read_head(&mut socket).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n0123456789")
                    .await;
                let _ = socket.flush().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
                drop(socket);
            });
        }
    });

    addr
}

/// Default test configuration pointing at `upstream`.
pub fn proxy_config(upstream: &str) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.address = "127.0.0.1".into();
    config.listener.port = 0;
    config.upstream.url = upstream.to_string();
    config.timeouts.request_timeout_ms = 5_000;
    config
}

/// A running proxy with an in-memory log sink. Shuts down on drop.
pub struct TestProxy {
    pub addr: SocketAddr,
    pub sink: Arc<MemorySink>,
    shutdown: Shutdown,
}

impl TestProxy {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestProxy {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_proxy(config: ProxyConfig) -> TestProxy {
    let sink = Arc::new(MemorySink::new());
    let server = HttpServer::with_sink(config, sink.clone()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestProxy {
        addr,
        sink,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
