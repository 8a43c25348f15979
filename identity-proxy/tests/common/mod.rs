//! Shared setup for identity-proxy integration tests.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use http_body_util::BodyExt;
use identity_proxy::{
    build_router,
    config::ProxyConfig,
    services::{seed, ClaimDocument, JwtService, Signed, Store},
    AppState,
};
use tower::ServiceExt;

pub use identity_proxy::proxy::ASSERTION_HEADER;

/// Fixed RSA key pair so tests skip key generation.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/jwt_private.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/jwt_public.pem");

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    /// Seeded proxy in front of `upstream_url` with fast retries.
    pub fn new(upstream_url: &str) -> Self {
        let mut config = ProxyConfig::for_upstream(upstream_url);
        config.upstream.max_attempts = 2;
        config.upstream.retry_backoff_ms = 10;
        config.upstream.timeout_secs = 5;
        Self::with_config(config)
    }

    pub fn with_config(config: ProxyConfig) -> Self {
        let jwt = JwtService::from_pem(&config.jwt, TEST_PRIVATE_KEY, TEST_PUBLIC_KEY)
            .expect("Failed to load test keys");
        let store = Store::from(seed::fixtures());
        let state = AppState::new(config, store, jwt).expect("Failed to build state");

        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed")
    }

    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn get_as(&self, uri: &str, username: &str, password: &str) -> Response<Body> {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, basic(username, password))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn delete(&self, uri: &str) -> Response<Body> {
        self.send(Request::delete(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Verify an assertion with the proxy's public key.
    pub fn decode_assertion(&self, token: &str) -> Signed<ClaimDocument> {
        self.state
            .jwt
            .validate(token)
            .expect("Assertion failed verification")
    }
}

pub fn basic(username: &str, password: &str) -> String {
    format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", username, password))
    )
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("Body is not JSON")
}

/// `name=value` pairs from every `Set-Cookie` header.
pub fn set_cookies(response: &Response<Body>) -> Vec<(String, String)> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v)
}
