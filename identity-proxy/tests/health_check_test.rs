//! Health and metrics endpoint integration tests.

mod common;

use axum::http::StatusCode;
use common::{body_bytes, body_json, TestApp};

#[tokio::test]
async fn health_check_returns_200() {
    // Arrange
    let app = TestApp::new("http://127.0.0.1:1");

    // Act
    let response = app.get("/health").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn metrics_endpoint_is_served_locally() {
    let app = TestApp::new("http://127.0.0.1:1");

    let response = app.get("/metrics").await;

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    // No recorder is installed in tests, so the body may be empty.
    let _ = body_bytes(response).await;
}
