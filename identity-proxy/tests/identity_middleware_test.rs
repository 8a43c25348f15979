//! Identity substitution on proxied requests.

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::{basic, body_json, TestApp, ASSERTION_HEADER};
use wiremock::{
    matchers::{header as header_is, method, path},
    Mock, MockServer, ResponseTemplate,
};

async fn upstream_ok() -> MockServer {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&upstream)
        .await;
    upstream
}

#[tokio::test]
async fn test_basic_credentials_are_replaced_by_assertion() {
    // Arrange
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    // Act
    let response = app
        .get_as("/api/galaxy/v3/collections/", "jdoe", "redhat")
        .await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);

    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let forwarded = &received[0];
    assert!(forwarded.headers.get("authorization").is_none());

    let token = forwarded.headers[ASSERTION_HEADER].to_str().unwrap();
    let claims = app.decode_assertion(token).claims;
    assert_eq!(claims.sub, "bc243368-a9d4-4f8f-9ffe-5d2d921fce96");
    assert_eq!(claims.user_data.username, "jdoe");
    assert!(claims.global_roles.is_empty());

    let org_names: Vec<_> = claims
        .objects
        .organization
        .iter()
        .map(|o| o.name.as_str())
        .collect();
    for name in ["Default", "Organization 1", "Organization 2", "system:partner-engineers"] {
        assert!(org_names.contains(&name), "missing {}", name);
    }
    assert_eq!(claims.objects.team.len(), 1);
    assert_eq!(claims.objects.team[0].name, "peteam");
    let team_org = claims.objects.team[0].org;
    assert_eq!(
        claims.objects.organization[team_org].name,
        "system:partner-engineers"
    );
    assert_eq!(claims.object_roles["Team Member"].objects, vec![0]);
}

#[tokio::test]
async fn test_system_auditor_gets_platform_auditor() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get_as("/api/galaxy/v3/", "admin", "admin").await;
    assert_eq!(response.status(), StatusCode::OK);

    let received = upstream.received_requests().await.unwrap();
    let token = received[0].headers[ASSERTION_HEADER].to_str().unwrap();
    let claims = app.decode_assertion(token).claims;
    assert_eq!(claims.global_roles, vec!["Platform Auditor".to_string()]);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get_as("/api/galaxy/v3/", "jdoe", "wrong").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_user_is_rejected() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get_as("/api/galaxy/v3/", "nobody", "redhat").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_lowercase_basic_scheme_is_accepted() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());
    let credentials = basic("jdoe", "redhat").replacen("Basic", "basic", 1);

    let response = app
        .send(
            Request::get("/api/galaxy/v3/")
                .header(header::AUTHORIZATION, credentials)
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    let token = received[0].headers[ASSERTION_HEADER].to_str().unwrap();
    assert_eq!(app.decode_assertion(token).claims.user_data.username, "jdoe");
}

#[tokio::test]
async fn test_malformed_basic_header_is_rejected() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app
        .send(
            Request::get("/api/galaxy/v3/")
                .header(header::AUTHORIZATION, "Basic !!!not-base64")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_anonymous_request_forwarded_unchanged() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app.get("/api/galaxy/v3/").await;

    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    assert!(received[0].headers.get(ASSERTION_HEADER).is_none());
}

#[tokio::test]
async fn test_bearer_token_forwarded_without_assertion() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app
        .send(
            Request::get("/api/galaxy/v3/")
                .header(header::AUTHORIZATION, "Bearer abc123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    assert_eq!(received[0].headers["authorization"], "Bearer abc123");
    assert!(received[0].headers.get(ASSERTION_HEADER).is_none());
}

#[tokio::test]
async fn test_passthrough_prefix_keeps_credentials() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v2/"))
        .and(header_is("authorization", basic("jdoe", "wrong").as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    // Act: even bad credentials pass straight through.
    let response = app.get_as("/v2/", "jdoe", "wrong").await;

    // Assert
    assert_eq!(response.status(), StatusCode::OK);
    let received = upstream.received_requests().await.unwrap();
    assert!(received[0].headers.get(ASSERTION_HEADER).is_none());
}

#[tokio::test]
async fn test_unknown_csrftoken_is_forbidden() {
    let upstream = upstream_ok().await;
    let app = TestApp::new(&upstream.uri());

    let response = app
        .send(
            Request::get("/api/galaxy/v3/")
                .header(header::COOKIE, "csrftoken=forged")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = body_json(response).await;
    assert_eq!(body["error"], "invalid csrftoken");
    assert!(upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upstream_issued_csrftoken_is_forwarded() {
    // Arrange
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/galaxy/ui/v1/me/"))
        .respond_with(
            ResponseTemplate::new(200).insert_header("set-cookie", "csrftoken=up-123; Path=/"),
        )
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/galaxy/v3/collections/"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&upstream)
        .await;
    let app = TestApp::new(&upstream.uri());

    // Act
    let first = app.get("/api/galaxy/ui/v1/me/").await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .send(
            Request::post("/api/galaxy/v3/collections/")
                .header(header::COOKIE, "csrftoken=up-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    // Assert
    assert_eq!(second.status(), StatusCode::CREATED);
}
