//! Retry logic with backoff
//!
//! Every retried operation in the crate goes through [`download_with_retry`].
//! Errors decide for themselves whether another attempt can help via
//! [`IsRetryable`]; the loop only counts attempts and sleeps between them.
//!
//! # Example
//!
//! ```no_run
//! use comic_fetch::retry::{IsRetryable, download_with_retry};
//! use comic_fetch::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{self:?}")
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! let outcome = download_with_retry(&config, config.max_attempts, |_attempt| async {
//!     Ok::<_, MyError>(())
//! })
//! .await;
//! outcome.result?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::Error;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, non-2xx responses, connection resets) return `true`.
/// Failures a repeat cannot fix (permission denied, disk full, bad input) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            // Any non-success status
            Error::HttpStatus { .. } => true,
            Error::Timeout { .. } => true,
            Error::Network(e) => {
                // Builder/redirect-policy errors repeat identically
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            // Only socket-level kinds; anything else is the local filesystem
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            Error::Filesystem { .. } | Error::Destination { .. } => false,
            Error::Config { .. } | Error::InvalidBatch(_) | Error::InvalidUrl { .. } => false,
            Error::Serialization(_) | Error::Xml(_) => false,
            Error::Page { .. } => false,
            Error::Cancelled => false,
        }
    }
}

/// Result of a retried operation plus the number of attempts it took
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final value or the last error observed
    pub result: Result<T, E>,
    /// Attempts started, the first one included
    pub attempts: u32,
}

/// Execute an async operation, retrying retryable errors with backoff
///
/// `max_attempts` is the total attempt budget (the first try counts). The
/// closure receives the 1-based attempt number. Attempts are strictly
/// sequential: attempt N+1 starts only after attempt N's error was observed
/// and the backoff delay (`config.backoff` over `config.base_delay`, capped at
/// `config.max_delay`) has elapsed.
pub async fn download_with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    max_attempts: u32,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "Operation succeeded after retry");
                }
                return RetryOutcome {
                    result: Ok(result),
                    attempts: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                let delay = config
                    .backoff
                    .delay(config.base_delay, attempt, config.max_delay);
                let delay = if config.jitter { add_jitter(delay) } else { delay };

                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    delay_ms = delay.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(
                        error = %e,
                        attempt = attempt,
                        "Operation failed with non-retryable error"
                    );
                }
                return RetryOutcome {
                    result: Err(e),
                    attempts: attempt,
                };
            }
        }
    }
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The returned delay lies between `delay` and `2 * delay`. Delays too large
/// to grow are returned unchanged.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}
