use crate::AppState;
use service_core::axum::{extract::State, http::header, response::IntoResponse};

/// PEM-encoded public key that verifies identity assertions.
pub async fn jwt_key(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/x-pem-file")],
        state.jwt.public_key_pem().to_string(),
    )
}
