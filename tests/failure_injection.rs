//! Failure injection tests for the relay proxy.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use relay_proxy::config::loader::parse_byte_size;
use serde_json::json;

mod common;

#[tokio::test]
async fn test_unreachable_upstream_returns_502_and_still_logs() {
    let dead = common::unreachable_addr().await;
    let proxy = common::start_proxy(common::proxy_config(&format!("http://{dead}"))).await;

    let res = common::client()
        .post(proxy.url("/rpc"))
        .header("content-type", "application/json")
        .body(r#"{"x":1}"#)
        .send()
        .await
        .expect("Proxy unreachable");

    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        res.headers()["content-type"],
        "text/plain; charset=utf-8"
    );
    let text = res.text().await.unwrap();
    assert!(text.starts_with("Something went wrong. \n\n\n"), "got {text:?}");

    let records = proxy.sink.records();
    assert_eq!(records.len(), 1, "record is emitted before forwarding");
    assert_eq!(records[0].body, Some(json!({"x": 1})));
}

#[tokio::test]
async fn test_oversized_body_is_rejected_before_upstream() {
    let backend = common::start_recording_backend(200, "done", &[]).await;
    let mut config = common::proxy_config(&format!("http://{}", backend.addr));
    config.limits.max_body_bytes = parse_byte_size("1kb").unwrap();
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .post(proxy.url("/upload"))
        .header("content-type", "application/json")
        .body(vec![b'1'; 10 * 1024])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(backend.hits(), 0, "upstream must never see an oversized body");
    assert!(proxy.sink.records().is_empty());
}

fn chunked(chunks: usize, size: usize) -> reqwest::Body {
    let parts = (0..chunks).map(move |_| Ok::<_, std::io::Error>(vec![b'z'; size]));
    reqwest::Body::wrap_stream(futures_util::stream::iter(parts))
}

#[tokio::test]
async fn test_oversized_chunked_upload_never_reaches_upstream() {
    let (upstream, connections, bytes) = common::start_counting_backend().await;
    let mut config = common::proxy_config(&format!("http://{upstream}"));
    config.limits.max_body_bytes = 1024;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .post(proxy.url("/upload"))
        .header("content-type", "text/plain")
        .body(chunked(4, 512))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(connections.load(Ordering::SeqCst), 0, "no upstream connection may be opened");
    assert_eq!(bytes.load(Ordering::SeqCst), 0);
    assert!(proxy.sink.records().is_empty());
}

#[tokio::test]
async fn test_chunked_upload_within_limit_is_relayed() {
    let backend = common::start_recording_backend(200, "done", &[]).await;
    let mut config = common::proxy_config(&format!("http://{}", backend.addr));
    config.limits.max_body_bytes = 1024;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .post(proxy.url("/upload"))
        .header("content-type", "text/plain")
        .body(chunked(2, 256))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&backend.requests()[0].body[..], &[b'z'; 512][..]);
    let records = proxy.sink.records();
    assert!(records[0].raw_body.is_none() && records[0].body.is_none());
}

#[tokio::test]
async fn test_body_at_the_limit_is_accepted() {
    let backend = common::start_recording_backend(200, "done", &[]).await;
    let mut config = common::proxy_config(&format!("http://{}", backend.addr));
    config.limits.max_body_bytes = 1024;
    let proxy = common::start_proxy(config).await;

    let res = common::client()
        .post(proxy.url("/upload"))
        .header("content-type", "application/octet-stream")
        .body(vec![7u8; 1024])
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(backend.requests()[0].body.len(), 1024);
}

#[tokio::test]
async fn test_slow_upstream_times_out_with_504() {
    let slow = common::start_slow_backend(Duration::from_secs(3)).await;
    let mut config = common::proxy_config(&format!("http://{slow}"));
    config.timeouts.request_timeout_ms = 200;
    let proxy = common::start_proxy(config).await;

    let start = Instant::now();
    let res = common::client().get(proxy.url("/slow")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
    assert!(
        start.elapsed() < Duration::from_secs(2),
        "deadline should fire well before the upstream answers"
    );
    assert!(res.text().await.unwrap().contains("Something went wrong"));
    assert_eq!(proxy.sink.records().len(), 1);
}

#[tokio::test]
async fn test_client_disconnect_cancels_upstream_request() {
    let (hanging, mut closed) = common::start_hanging_backend().await;
    let mut config = common::proxy_config(&format!("http://{hanging}"));
    config.timeouts.request_timeout_ms = 30_000;
    let proxy = common::start_proxy(config).await;

    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let result = client.get(proxy.url("/hang")).send().await;
    assert!(result.is_err(), "client gives up first");

    let held_for = tokio::time::timeout(Duration::from_secs(3), closed.recv())
        .await
        .expect("proxy kept the upstream connection open after the client left")
        .expect("backend task ended");
    assert!(held_for < Duration::from_secs(3));
}

#[tokio::test]
async fn test_mid_stream_failure_aborts_client_response() {
    let truncating = common::start_truncating_backend().await;
    let proxy = common::start_proxy(common::proxy_config(&format!("http://{truncating}"))).await;

    let res = common::client().get(proxy.url("/partial")).send().await.unwrap();

    // Headers were already relayed, so the failure can only surface as a
    // broken body.
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.bytes().await.is_err());
}

#[tokio::test]
async fn test_proxy_keeps_serving_after_upstream_failure() {
    let dead = common::unreachable_addr().await;
    let proxy = common::start_proxy(common::proxy_config(&format!("http://{dead}"))).await;
    let client = common::client();

    for _ in 0..3 {
        let res = client.get(proxy.url("/")).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    }
    assert_eq!(proxy.sink.records().len(), 3);
}
