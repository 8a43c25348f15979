//! Forwarding of inbound requests to the upstream origin.

use axum::body::Bytes;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum_extra::extract::cookie::Cookie;
use reqwest::{redirect, Client};
use secrecy::{ExposeSecret, Secret};
use service_core::http::{retry_http_call, RetryConfig, TransportError};
use service_core::observability::{inject_trace_context, REQUEST_ID_HEADER};
use service_core::utils::signature::{generate_trust_token, TRUSTED_PROXY_HEADER};
use std::time::Duration;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::services::sessions::{SessionStore, CSRF_COOKIE};

/// Header carrying the signed identity assertion.
pub const ASSERTION_HEADER: &str = "x-dab-jw-token";

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Collapse runs of `/` into a single separator.
pub fn normalize_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

/// Archive downloads keep their redirect responses intact.
pub fn is_archive_path(path: &str) -> bool {
    path.contains(".tar.gz")
}

/// Upstream reply with the body fully buffered.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Headers safe to relay to the client. Framing headers are dropped since
    /// the body may be rewritten.
    pub fn relay_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            if is_hop_by_hop(name) || name == axum::http::header::CONTENT_LENGTH {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }
        headers
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(axum::http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Remember any `csrftoken` the upstream issued.
    pub fn record_csrf_cookies(&self, sessions: &SessionStore) {
        for value in self.headers.get_all(axum::http::header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            if let Ok(cookie) = Cookie::parse(raw) {
                if cookie.name() == CSRF_COOKIE && !cookie.value().is_empty() {
                    sessions.remember_downstream_csrf(cookie.value());
                }
            }
        }
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    follow: Client,
    no_follow: Client,
    base_url: String,
    retry: RetryConfig,
    shared_secret: Option<Secret<String>>,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self, anyhow::Error> {
        let timeout = Duration::from_secs(config.upstream.timeout_secs);

        let follow = Client::builder().timeout(timeout).build()?;
        let no_follow = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .build()?;

        if config.shared_secret.is_none() {
            tracing::warn!("ANSIBLE_BASE_SHARED_SECRET is not set; upstream trust header disabled");
        }

        Ok(Self {
            follow,
            no_follow,
            base_url: config.upstream.url.clone(),
            retry: config.upstream.retry_config(),
            shared_secret: config.shared_secret.clone(),
        })
    }

    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, normalize_path(path), q),
            _ => format!("{}{}", self.base_url, normalize_path(path)),
        }
    }

    fn outbound_headers(&self, inbound: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(inbound.len() + 4);
        for (name, value) in inbound {
            if is_hop_by_hop(name)
                || name == axum::http::header::HOST
                || name == axum::http::header::CONTENT_LENGTH
            {
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
        headers.insert("x-envoy-internal", HeaderValue::from_static("true"));
        if let Ok(value) = HeaderValue::from_str(&Uuid::new_v4().to_string()) {
            headers.insert(REQUEST_ID_HEADER, value);
        }

        if let Some(secret) = &self.shared_secret {
            match generate_trust_token(secret.expose_secret(), None) {
                Ok(token) => {
                    if let Ok(value) = HeaderValue::from_str(&token) {
                        headers.insert(TRUSTED_PROXY_HEADER, value);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to generate trust token"),
            }
        }

        inject_trace_context(&mut headers);
        headers
    }

    /// Send the request upstream, retrying transient socket failures.
    pub async fn forward(
        &self,
        method: Method,
        path: &str,
        query: Option<&str>,
        inbound_headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse, TransportError> {
        let url = self.target_url(path, query);
        let headers = self.outbound_headers(inbound_headers);
        let client = if is_archive_path(path) {
            &self.no_follow
        } else {
            &self.follow
        };

        tracing::debug!(method = %method, url = %url, "Forwarding request upstream");

        retry_http_call(&self.retry, "proxy_forward", || {
            let request = client
                .request(method.clone(), &url)
                .headers(headers.clone())
                .body(body.clone());

            async move {
                let response = request.send().await?;
                let status = response.status();
                let headers = response.headers().clone();
                let body = response.bytes().await?;

                Ok::<_, reqwest::Error>(UpstreamResponse {
                    status,
                    headers,
                    body,
                })
            }
        })
        .await
    }
}
