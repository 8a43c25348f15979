//! Identity substitution for proxied requests.
//!
//! Works out who the caller is (session cookie first, then HTTP Basic),
//! signs their claims, and swaps the `Authorization` header for the
//! assertion header before the request reaches the upstream.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use metrics::counter;
use service_core::error::AppError;

use crate::proxy::ASSERTION_HEADER;
use crate::services::sessions::{CSRF_COOKIE, SESSION_COOKIE};
use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    Session,
    Basic,
}

impl IdentitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentitySource::Session => "session",
            IdentitySource::Basic => "basic",
        }
    }
}

/// The acting user as claimed by the request. Basic passwords are carried
/// along unchecked.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub username: String,
    pub password: Option<String>,
    pub source: IdentitySource,
}

fn unauthorized(message: &str) -> AppError {
    AppError::Unauthorized(anyhow::anyhow!(message.to_string()))
}

/// Decode a `Basic` credential into `(username, password)`.
pub fn decode_basic(raw: &str) -> Result<(String, String), AppError> {
    let encoded = raw
        .get(5..)
        .filter(|_| is_basic(raw))
        .and_then(|rest| rest.strip_prefix(' '))
        .ok_or_else(|| unauthorized("Malformed Authorization header"))?;
    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| unauthorized("Invalid base64 in Authorization header"))?;
    let decoded =
        String::from_utf8(decoded).map_err(|_| unauthorized("Invalid credential encoding"))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| unauthorized("Invalid credential format"))?;

    Ok((username.to_string(), password.to_string()))
}

fn is_basic(raw: &str) -> bool {
    raw.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("basic"))
}

/// Resolve the caller from a live session or a Basic header.
///
/// Returns `Ok(None)` when neither is present. A Basic header that cannot be
/// decoded is an error.
pub fn identify(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<Option<Identity>, AppError> {
    if let Some(username) = jar
        .get(SESSION_COOKIE)
        .and_then(|c| state.sessions.username_for(c.value()))
    {
        return Ok(Some(Identity {
            username,
            password: None,
            source: IdentitySource::Session,
        }));
    }

    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let raw = value
        .to_str()
        .map_err(|_| unauthorized("Malformed Authorization header"))?;
    if !is_basic(raw) {
        return Ok(None);
    }

    let (username, password) = decode_basic(raw)?;
    Ok(Some(Identity {
        username,
        password: Some(password),
        source: IdentitySource::Basic,
    }))
}

pub async fn identity_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path().to_string();

    if state.config.is_passthrough(&path) {
        tracing::debug!(path = %path, "Passthrough path, forwarding unchanged");
        return Ok(next.run(req).await);
    }

    if let Some(token) = jar.get(CSRF_COOKIE).map(|c| c.value().to_string()) {
        if !state.sessions.is_local_csrf(&token) {
            if state.sessions.is_downstream_csrf(&token) {
                return Ok(next.run(req).await);
            }
            tracing::warn!(path = %path, "Rejecting request with unknown csrftoken");
            return Err(AppError::Forbidden(anyhow::anyhow!("invalid csrftoken")));
        }
    }

    let Some(identity) = identify(&state, &jar, req.headers())? else {
        return Ok(next.run(req).await);
    };

    let token = state
        .claims
        .issue(&identity.username, identity.password.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(
                username = %identity.username,
                source = identity.source.as_str(),
                error = %e,
                "Identity substitution failed"
            );
            AppError::from(e)
        })?;

    let value = HeaderValue::from_str(&token)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Invalid assertion header: {}", e)))?;

    let headers = req.headers_mut();
    headers.remove(header::AUTHORIZATION);
    headers.insert(ASSERTION_HEADER, value);

    counter!("identity_assertions_total", "source" => identity.source.as_str()).increment(1);
    tracing::debug!(
        username = %identity.username,
        source = identity.source.as_str(),
        "Attached identity assertion"
    );

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(credentials: &str) -> String {
        format!("Basic {}", STANDARD.encode(credentials))
    }

    #[test]
    fn test_decode_basic() {
        let (user, pass) = decode_basic(&basic("jdoe:redhat")).unwrap();
        assert_eq!(user, "jdoe");
        assert_eq!(pass, "redhat");
    }

    #[test]
    fn test_password_may_contain_colon() {
        let (user, pass) = decode_basic(&basic("jdoe:red:hat")).unwrap();
        assert_eq!(user, "jdoe");
        assert_eq!(pass, "red:hat");
    }

    #[test]
    fn test_decode_basic_scheme_is_case_insensitive() {
        let (user, pass) = decode_basic("basic amRvZTpyZWRoYXQ=").unwrap();
        assert_eq!((user.as_str(), pass.as_str()), ("jdoe", "redhat"));

        let (user, _) = decode_basic("BASIC amRvZTpyZWRoYXQ=").unwrap();
        assert_eq!(user, "jdoe");
    }

    #[test]
    fn test_decode_basic_failures() {
        assert!(decode_basic("Basic").is_err());
        assert!(decode_basic("Bearer amRvZTpyZWRoYXQ=").is_err());
        assert!(decode_basic("Basicamrvztpyzwroyxq=").is_err());
        assert!(decode_basic("Basic !!!not-base64").is_err());
        assert!(decode_basic(&basic("no-separator")).is_err());
    }

    #[test]
    fn test_scheme_detection() {
        assert!(is_basic("Basic abc"));
        assert!(is_basic("BASIC abc"));
        assert!(!is_basic("Bearer abc"));
        assert!(!is_basic("Bas"));
    }
}
