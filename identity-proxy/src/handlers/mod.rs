pub mod app;
pub mod auth;
pub mod organizations;
pub mod proxy;
pub mod roles;
pub mod teams;
pub mod users;
pub mod well_known;

use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;

use crate::middleware::identify;
use crate::AppState;

/// Username of the caller for service-index bookkeeping. Credentials are
/// not checked here.
pub(crate) fn requester(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    identify(state, jar, headers)
        .ok()
        .flatten()
        .map(|identity| identity.username)
}
