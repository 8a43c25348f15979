use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use service_core::error::AppError;
use service_core::http::TransportError;
use std::borrow::Cow;

use crate::proxy::ResponseRewriter;
use crate::AppState;

/// Forward the request upstream and relay the reply.
pub async fn forward(State(state): State<AppState>, req: Request) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();
    let body = body
        .collect()
        .await
        .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Failed to read request body: {}", e)))?
        .to_bytes();

    let upstream = state
        .upstream
        .forward(
            parts.method,
            parts.uri.path(),
            parts.uri.query(),
            &parts.headers,
            body,
        )
        .await
        .map_err(|e| match e {
            TransportError::Fatal(msg) => AppError::BadGateway(msg),
            exhausted @ TransportError::RetriesExhausted { .. } => {
                AppError::ServiceUnavailable(exhausted.to_string())
            }
        })?;

    upstream.record_csrf_cookies(&state.sessions);

    let body = if ResponseRewriter::applies_to(upstream.content_type()) {
        match state.rewriter.rewrite(&upstream.body) {
            Cow::Borrowed(_) => upstream.body.clone(),
            Cow::Owned(rewritten) => Bytes::from(rewritten),
        }
    } else {
        upstream.body.clone()
    };

    Ok((upstream.status, upstream.relay_headers(), Body::from(body)).into_response())
}
