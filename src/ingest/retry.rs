// src/ingest/retry.rs
//! Bounded retry for upstream HTTP calls.
//!
//! Rate limits (429) wait for `Retry-After` or the fixed rate-limit delay,
//! server errors and timeouts back off exponentially, everything else fails
//! immediately.

use std::time::Duration;

use anyhow::Result;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Base delay for exponential backoff (ms).
    pub base_delay_ms: u64,
    /// Cap for backoff delays (ms).
    pub max_delay_ms: u64,
    /// Fixed wait after a 429 without `Retry-After` (ms).
    pub rate_limit_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 10_000,
            rate_limit_delay_ms: 15_000,
        }
    }
}

impl RetryPolicy {
    /// Policy that never sleeps; handy for tests against local servers.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay_ms: 0,
            max_delay_ms: 0,
            rate_limit_delay_ms: 0,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryStrategy {
    Retry,
    RetryWithDelay(Duration),
    NoRetry,
}

/// Failure of an upstream call after retries were exhausted or skipped.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{source_name} returned HTTP {status}: {body}")]
    Status {
        source_name: &'static str,
        status: u16,
        body: String,
    },
    #[error("{source_name} request failed: {error}")]
    Request {
        source_name: &'static str,
        #[source]
        error: reqwest::Error,
    },
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::Status { status, .. } => Some(*status),
            UpstreamError::Request { .. } => None,
        }
    }
}

/// Retry decision for an HTTP status.
pub fn strategy_for_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    policy: &RetryPolicy,
) -> RetryStrategy {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let wait = retry_after.unwrap_or(Duration::from_millis(policy.rate_limit_delay_ms));
        return RetryStrategy::RetryWithDelay(wait.min(Duration::from_secs(60)));
    }
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        return RetryStrategy::Retry;
    }
    RetryStrategy::NoRetry
}

/// Retry decision for a transport error.
pub fn strategy_for_error(error: &reqwest::Error) -> RetryStrategy {
    if error.is_timeout() || error.is_connect() {
        RetryStrategy::Retry
    } else {
        RetryStrategy::NoRetry
    }
}

/// Exponential backoff for the given 1-based attempt, capped at `max_delay_ms`.
pub fn calculate_delay(attempt: u32, policy: &RetryPolicy) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let ms = policy.base_delay_ms.saturating_mul(1u64 << exp);
    Duration::from_millis(ms.min(policy.max_delay_ms))
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Send the request produced by `build` until it succeeds or the policy gives up.
///
/// `build` is called once per attempt because a `RequestBuilder` is consumed by `send`.
pub async fn send_with_retry<F>(
    policy: &RetryPolicy,
    source_name: &'static str,
    build: F,
) -> Result<Response>
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        let (strategy, err) = match build().send().await {
            Ok(resp) if resp.status().is_success() => return Ok(resp),
            Ok(resp) => {
                let status = resp.status();
                let strategy = strategy_for_status(status, retry_after(&resp), policy);
                let body = resp.text().await.unwrap_or_default();
                let err = UpstreamError::Status {
                    source_name,
                    status: status.as_u16(),
                    body: truncate(&body, 300),
                };
                (strategy, err)
            }
            Err(error) => (
                strategy_for_error(&error),
                UpstreamError::Request { source_name, error },
            ),
        };

        let wait = match strategy {
            RetryStrategy::NoRetry => return Err(err.into()),
            _ if attempt >= max_attempts => {
                warn!(source = source_name, attempt, error = %err, "giving up after retries");
                return Err(err.into());
            }
            RetryStrategy::RetryWithDelay(d) => d,
            RetryStrategy::Retry => calculate_delay(attempt, policy),
        };

        debug!(
            source = source_name,
            attempt,
            wait_ms = wait.as_millis() as u64,
            error = %err,
            "retrying upstream call"
        );
        tokio::time::sleep(wait).await;
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_uses_retry_after_or_fixed_delay() {
        let p = RetryPolicy::default();
        assert_eq!(
            strategy_for_status(StatusCode::TOO_MANY_REQUESTS, None, &p),
            RetryStrategy::RetryWithDelay(Duration::from_millis(15_000))
        );
        assert_eq!(
            strategy_for_status(
                StatusCode::TOO_MANY_REQUESTS,
                Some(Duration::from_secs(2)),
                &p
            ),
            RetryStrategy::RetryWithDelay(Duration::from_secs(2))
        );
    }

    #[test]
    fn client_errors_are_not_retried() {
        let p = RetryPolicy::default();
        assert_eq!(
            strategy_for_status(StatusCode::BAD_REQUEST, None, &p),
            RetryStrategy::NoRetry
        );
        assert_eq!(
            strategy_for_status(StatusCode::FORBIDDEN, None, &p),
            RetryStrategy::NoRetry
        );
        assert_eq!(
            strategy_for_status(StatusCode::BAD_GATEWAY, None, &p),
            RetryStrategy::Retry
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 350,
            ..RetryPolicy::default()
        };
        assert_eq!(calculate_delay(1, &p), Duration::from_millis(100));
        assert_eq!(calculate_delay(2, &p), Duration::from_millis(200));
        assert_eq!(calculate_delay(3, &p), Duration::from_millis(350));
    }
}
