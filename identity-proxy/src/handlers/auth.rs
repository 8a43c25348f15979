//! Login, logout and the caller's own profile.

use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::{json, Value};
use service_core::error::AppError;

use crate::middleware::{identify, IdentitySource};
use crate::models::UserResponse;
use crate::services::sessions::{
    new_csrf_token, CSRF_COOKIE, CSRF_HEADER, LOGIN_CSRF_COOKIE, SESSION_COOKIE,
};
use crate::AppState;

fn day_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .max_age(time::Duration::hours(24))
        .build()
}

/// Issue a login CSRF token as both a cookie and the response body.
pub async fn login_form(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let token = new_csrf_token();
    (
        jar.add(day_cookie(LOGIN_CSRF_COOKIE, token.clone())),
        Json(json!({ "csrfToken": token })),
    )
}

/// Establish a session for the submitted username.
///
/// The `X-CSRFToken` header must match the `csrfToken` cookie. The password
/// is not checked.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(CookieJar, Json<Value>), AppError> {
    let cookie_token = jar
        .get(LOGIN_CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("CSRF token cookie not found")))?;
    let header_token = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Forbidden(anyhow::anyhow!("CSRF token header not found")))?;
    if cookie_token != header_token {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "CSRF token in cookie does not match header"
        )));
    }

    let mut username = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        AppError::BadRequest(anyhow::anyhow!("Failed to parse multipart form: {}", e))
    })? {
        if field.name() == Some("username") {
            let value = field.text().await.map_err(|e| {
                AppError::BadRequest(anyhow::anyhow!("Failed to read username: {}", e))
            })?;
            username = Some(value);
        }
    }
    let username = username
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("username is required")))?;

    let session = state.sessions.create(&username);

    let jar = jar
        .add(day_cookie(CSRF_COOKIE, session.csrf_token))
        .add(day_cookie(SESSION_COOKIE, session.session_id));

    Ok((jar, Json(json!({ "message": "Login successful" }))))
}

/// Drop the caller's session and expire the session cookies.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<Value>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Some(session) = state.sessions.remove(cookie.value()) {
            tracing::info!(username = %session.username, "Session ended");
        }
    }

    let jar = jar
        .remove(Cookie::build(SESSION_COOKIE).path("/"))
        .remove(Cookie::build(CSRF_COOKIE).path("/"));

    (jar, Json(json!({ "message": "Logout successful" })))
}

/// The user behind the session cookie or Basic credentials.
pub async fn me(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, AppError> {
    let identity = identify(&state, &jar, &headers)?
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Authentication required")))?;

    let user = state
        .store
        .find_user_by_username(&identity.username)
        .await
        .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Invalid credentials")))?;

    if identity.source == IdentitySource::Basic {
        let password = identity.password.as_deref().unwrap_or_default();
        if !user.password_matches(password) {
            return Err(AppError::Unauthorized(anyhow::anyhow!("Invalid credentials")));
        }
    }

    Ok(Json(user.to_response()))
}
