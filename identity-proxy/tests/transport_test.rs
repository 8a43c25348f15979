//! Forwarding behaviour against a mock upstream.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{body_bytes, body_json, TestApp};
use identity_proxy::config::ProxyConfig;
use secrecy::Secret;
use service_core::utils::signature::{verify_trust_token, TRUSTED_PROXY_HEADER};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

#[tokio::test]
async fn test_outbound_headers_are_added() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&upstream)
        .await;

    let mut config = ProxyConfig::for_upstream(&upstream.uri());
    config.shared_secret = Some(Secret::new("redhat1234".to_string()));
    config.upstream.retry_backoff_ms = 10;
    let app = TestApp::with_config(config);

    // Act
    let response = app
        .send(
            Request::get("/api/galaxy/v3/")
                .header("x-request-id", "inbound-id")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    let headers = &received[0].headers;
    assert_eq!(headers["x-forwarded-proto"], "http");
    assert_eq!(headers["x-envoy-internal"], "true");
    assert_eq!(headers["accept"], "application/json");
    assert_ne!(headers["x-request-id"], "inbound-id");

    let token = headers[TRUSTED_PROXY_HEADER].to_str().unwrap();
    assert!(verify_trust_token("redhat1234", token).unwrap());
}

#[tokio::test]
async fn test_path_and_query_are_preserved() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/collections/"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get("/api//galaxy///v3/collections/?limit=10").await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_body_and_method_are_relayed() {
    let upstream = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/galaxy/v3/namespaces/ns/"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    let response = app
        .send(
            Request::put("/api/galaxy/v3/namespaces/ns/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"name":"ns"}"#))
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received[0].body, br#"{"name":"ns"}"#);
}

#[tokio::test]
async fn test_upstream_errors_are_relayed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(serde_json::json!({"detail": "Not found."})),
        )
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get("/api/galaxy/v3/missing/").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["detail"], "Not found.");
}

#[tokio::test]
async fn test_download_urls_point_back_at_proxy() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/artifacts/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"download_url":"https://example.com/x/y.tar.gz","href":"https://example.com/x"}"#,
            "application/json",
        ))
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    // Act
    let response = app.get("/api/galaxy/v3/artifacts/").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["download_url"], "http://localhost:8080/x/y.tar.gz");
    assert_eq!(body["href"], "https://example.com/x");
}

#[tokio::test]
async fn test_binary_bodies_are_not_rewritten() {
    let payload = br#"{"download_url":"https://example.com/x"}"#.to_vec();
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(payload.clone(), "application/gzip"))
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get("/api/galaxy/v3/blob").await;

    assert_eq!(body_bytes(response).await, payload);
}

#[tokio::test]
async fn test_archive_redirect_is_not_followed() {
    // Arrange
    let upstream = MockServer::start().await;
    let location = "https://s3.example.com/bucket/ns-col-1.0.0.tar.gz?sig=abc%2F1";
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/artifacts/ns-col-1.0.0.tar.gz"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", location))
        .expect(1)
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    // Act
    let response = app
        .get("/api/galaxy/v3/artifacts/ns-col-1.0.0.tar.gz")
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], location);
}

#[tokio::test]
async fn test_other_redirects_are_followed() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/old/"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/api/galaxy/v3/new/", upstream.uri())),
        )
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/v3/new/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("moved"))
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get("/api/galaxy/v3/old/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"moved");
}

#[tokio::test]
async fn test_unreachable_upstream_is_bad_gateway() {
    let app = TestApp::new("http://127.0.0.1:1");

    let response = app.get("/api/galaxy/v3/").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

/// Upstream that resets its first `failures` connections, then answers `ok`.
///
/// Each failing connection reads one byte and closes with the rest of the
/// request unread, which makes the kernel send RST.
async fn flaky_upstream(failures: usize) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let seen = counter.fetch_add(1, Ordering::SeqCst);
            let mut buf = [0u8; 1];

            if seen < failures {
                let _ = socket.read(&mut buf).await;
                drop(socket);
                continue;
            }

            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&chunk[..n]),
                }
            }
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });

    (url, accepted)
}

fn retrying_app(upstream_url: &str, max_attempts: u32) -> TestApp {
    let mut config = ProxyConfig::for_upstream(upstream_url);
    config.upstream.max_attempts = max_attempts;
    config.upstream.retry_backoff_ms = 10;
    config.upstream.timeout_secs = 5;
    TestApp::with_config(config)
}

#[tokio::test]
async fn test_reset_connections_are_retried_until_success() {
    // Arrange
    let (url, accepted) = flaky_upstream(3).await;
    let app = retrying_app(&url, 5);

    // Act
    let response = app.get("/api/galaxy/v3/").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await, b"ok");
    assert_eq!(accepted.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_persistent_resets_are_service_unavailable() {
    let (url, accepted) = flaky_upstream(usize::MAX).await;
    let app = retrying_app(&url, 3);

    let response = app.get("/api/galaxy/v3/").await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(accepted.load(Ordering::SeqCst), 3);
}
