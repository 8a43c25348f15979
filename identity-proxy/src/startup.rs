use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{metrics::metrics_middleware, tracing::request_id_middleware};
use service_core::observability::extract_request_id;
use tower_http::trace::TraceLayer;

use crate::handlers::{app, auth, organizations, proxy, roles, teams, users, well_known};
use crate::middleware::identity_middleware;
use crate::AppState;

pub const GATEWAY_PREFIX: &str = "/api/gateway/v1";

fn gateway_routes() -> Router<AppState> {
    Router::new()
        .route("/jwt_key/", get(well_known::jwt_key))
        .route("/login/", get(auth::login_form).post(auth::login))
        .route("/logout/", get(auth::logout).post(auth::logout))
        .route("/me/", get(auth::me))
        .route("/users/", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id/",
            get(users::get_user)
                .patch(users::update_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/organizations/",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/:id/",
            get(organizations::get_organization).delete(organizations::delete_organization),
        )
        .route("/teams/", get(teams::list_teams).post(teams::create_team))
        .route(
            "/teams/:id/",
            get(teams::get_team).delete(teams::delete_team),
        )
        .route("/teams/:id/users/associate/", post(teams::associate_users))
        .route("/role_definitions/", get(roles::list_role_definitions))
        .route(
            "/role_user_assignments/",
            get(roles::list_user_assignments).post(roles::create_user_assignment),
        )
        .route(
            "/role_user_assignments/:id/",
            axum::routing::delete(roles::delete_user_assignment),
        )
        .route(
            "/role_team_assignments/",
            get(roles::list_team_assignments).post(roles::create_team_assignment),
        )
        .route(
            "/role_team_assignments/:id/",
            axum::routing::delete(roles::delete_team_assignment),
        )
}

/// Local gateway endpoints plus a fallback that substitutes identity and
/// forwards everything else upstream.
pub fn build_router(state: AppState) -> Router {
    let proxied = Router::new()
        .fallback(proxy::forward)
        .layer(from_fn_with_state(state.clone(), identity_middleware))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(app::health_check))
        .route("/metrics", get(app::metrics))
        .nest(GATEWAY_PREFIX, gateway_routes())
        .fallback_service(proxied)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id =
                    extract_request_id(request.headers()).unwrap_or_else(|| "-".to_string());

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
}
