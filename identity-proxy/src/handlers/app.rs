use service_core::axum::{http::header, response::IntoResponse, Json};

use crate::services::metrics::get_metrics;

pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Prometheus scrape endpoint.
pub async fn metrics() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        get_metrics(),
    )
}
