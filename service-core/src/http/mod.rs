//! HTTP client utilities for talking to upstream services.

pub mod retry;

pub use retry::{RetryConfig, TransientKind, TransportError, retry_http_call, transient_kind};
