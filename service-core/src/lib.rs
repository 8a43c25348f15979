//! service-core: Shared infrastructure for the identity proxy services.
pub mod config;
pub mod error;
pub mod http;
pub mod middleware;
pub mod observability;
pub mod utils;

pub use axum;
pub use reqwest;
pub use serde;
pub use serde_json;
pub use tokio;
pub use tower;
pub use tower_http;
pub use tracing;
