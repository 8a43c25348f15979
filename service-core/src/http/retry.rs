//! Upstream HTTP retry utilities.
//!
//! Only a fixed set of socket-level failures is retried; everything else is
//! reported to the caller on the first attempt.

use metrics::counter;
use std::error::Error as StdError;
use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

/// Configuration for retry behavior.
#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }
}

/// Socket-level failures that are safe to retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransientKind {
    BrokenPipe,
    ConnectionReset,
    ClosedConnection,
    ClosedBody,
    UnexpectedEof,
}

impl TransientKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransientKind::BrokenPipe => "broken_pipe",
            TransientKind::ConnectionReset => "connection_reset",
            TransientKind::ClosedConnection => "closed_connection",
            TransientKind::ClosedBody => "closed_body",
            TransientKind::UnexpectedEof => "unexpected_eof",
        }
    }
}

/// Failure surfaced once the retry loop gives up.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Fatal(String),

    #[error("upstream request failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

fn classify_io(kind: io::ErrorKind) -> Option<TransientKind> {
    match kind {
        io::ErrorKind::BrokenPipe => Some(TransientKind::BrokenPipe),
        io::ErrorKind::ConnectionReset => Some(TransientKind::ConnectionReset),
        io::ErrorKind::NotConnected => Some(TransientKind::ClosedConnection),
        io::ErrorKind::UnexpectedEof => Some(TransientKind::UnexpectedEof),
        _ => None,
    }
}

fn classify_message(message: &str) -> Option<TransientKind> {
    let message = message.to_ascii_lowercase();

    if message.contains("broken pipe") {
        Some(TransientKind::BrokenPipe)
    } else if message.contains("connection reset") {
        Some(TransientKind::ConnectionReset)
    } else if message.contains("invalid read on closed body") {
        Some(TransientKind::ClosedBody)
    } else if message.contains("unexpected eof") || message.contains("unexpected end of file") {
        Some(TransientKind::UnexpectedEof)
    } else if message.contains("use of closed network connection")
        || message.contains("connection closed before message completed")
    {
        Some(TransientKind::ClosedConnection)
    } else {
        None
    }
}

/// Classify an error by walking its source chain.
///
/// An `io::Error` anywhere in the chain decides by kind; otherwise the
/// rendered messages are matched against the known transient phrases.
pub fn transient_kind(err: &(dyn StdError + 'static)) -> Option<TransientKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);

    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>()
            && let Some(kind) = classify_io(io_err.kind())
        {
            return Some(kind);
        }
        if let Some(kind) = classify_message(&e.to_string()) {
            return Some(kind);
        }
        current = e.source();
    }

    None
}

/// Execute an upstream call, retrying transient failures with a fixed backoff.
///
/// # Example
/// ```ignore
/// let response = retry_http_call(&config, "proxy_forward", || async {
///     client.execute(build_request()?).await
/// })
/// .await?;
/// ```
pub async fn retry_http_call<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    f: F,
) -> Result<T, TransportError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: StdError + 'static,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(
                        operation = operation_name,
                        attempt, "Upstream call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                let Some(kind) = transient_kind(&err) else {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "Upstream call failed with non-retryable error"
                    );
                    return Err(TransportError::Fatal(err.to_string()));
                };

                if attempt >= max_attempts {
                    warn!(
                        operation = operation_name,
                        attempt,
                        kind = kind.as_str(),
                        error = %err,
                        "Upstream call failed after max attempts"
                    );
                    return Err(TransportError::RetriesExhausted {
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }

                counter!("upstream_retries_total", "kind" => kind.as_str()).increment(1);
                warn!(
                    operation = operation_name,
                    attempt,
                    kind = kind.as_str(),
                    error = %err,
                    backoff_ms = config.backoff.as_millis() as u64,
                    "Upstream call failed, retrying after backoff"
                );

                sleep(config.backoff).await;
                attempt += 1;
            }
        }
    }
}
