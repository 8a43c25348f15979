//! Service index notifications against a mock upstream.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{basic, TestApp, ASSERTION_HEADER};
use identity_proxy::config::ProxyConfig;
use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header_exists, method, path},
    Mock, MockServer, ResponseTemplate,
};

const INDEX_PATH: &str = "/api/galaxy/service-index/resources/";

fn indexed_app(upstream: &MockServer) -> TestApp {
    let mut config = ProxyConfig::for_upstream(&upstream.uri());
    config.service_index.enabled = true;
    config.upstream.retry_backoff_ms = 10;
    TestApp::with_config(config)
}

#[tokio::test]
async fn test_send_created_posts_resource() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INDEX_PATH))
        .and(header_exists(ASSERTION_HEADER))
        .and(body_partial_json(json!({
            "ansible_id": "bc243368-a9d4-4f8f-9ffe-5d2d921fcee1",
            "resource_type": "shared.organization",
            "resource_data": {"name": "Organization 1"}
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&upstream)
        .await;
    let app = indexed_app(&upstream);
    let org = app.state.store.get_organization(2).await.unwrap();
    let resource = app.state.service_index.organization_resource(&org);

    // Act
    let result = app.state.service_index.send_created("admin", &resource).await;

    // Assert
    assert!(result.is_ok());
    let received = upstream.received_requests().await.unwrap();
    let token = received[0].headers[ASSERTION_HEADER].to_str().unwrap();
    assert_eq!(app.decode_assertion(token).claims.user_data.username, "admin");
}

#[tokio::test]
async fn test_send_created_reports_upstream_failure() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INDEX_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstream)
        .await;
    let app = indexed_app(&upstream);
    let user = app.state.store.get_user(4).await.unwrap();
    let resource = app.state.service_index.user_resource(&user);

    let result = app.state.service_index.send_created("admin", &resource).await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_send_deleted_tolerates_missing_resource() {
    let upstream = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}abc/", INDEX_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&upstream)
        .await;
    let app = indexed_app(&upstream);

    let result = app.state.service_index.send_deleted("admin", "abc").await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn test_team_resource_names_owning_organization() {
    let upstream = MockServer::start().await;
    let app = indexed_app(&upstream);
    let team = app.state.store.get_team(3).await.unwrap();
    let org = app.state.store.get_organization(team.organization).await;

    let resource = app.state.service_index.team_resource(&team, org.as_ref());

    assert_eq!(resource.resource_type, "shared.team");
    assert_eq!(
        resource.resource_data.organization.as_deref(),
        Some("bc243368-a9d4-4f8f-9ffe-5d2d921fcee3")
    );
}

#[tokio::test]
async fn test_admin_create_notifies_index() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INDEX_PATH))
        .and(body_partial_json(json!({
            "resource_type": "shared.user",
            "resource_data": {"username": "indexed"}
        })))
        .respond_with(ResponseTemplate::new(201))
        .mount(&upstream)
        .await;
    let app = indexed_app(&upstream);

    // Act
    let response = app
        .send(
            Request::post("/api/gateway/v1/users/")
                .header(header::AUTHORIZATION, basic("admin", "admin"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"username": "indexed"}).to_string()))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    // Assert: the notification runs on a background task.
    let mut delivered = false;
    for _ in 0..50 {
        if !upstream.received_requests().await.unwrap().is_empty() {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(delivered);
}

#[tokio::test]
async fn test_anonymous_create_skips_index() {
    let upstream = MockServer::start().await;
    let app = indexed_app(&upstream);

    let response = app
        .post_json("/api/gateway/v1/organizations/", json!({"name": "quiet"}))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(upstream.received_requests().await.unwrap().is_empty());
}
