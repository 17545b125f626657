//! Connection-establishment retry for streaming effects.
//!
//! # Connect Policy
//!
//! - Attempts: 5 in total (first try included)
//! - Connect timeout: 5 seconds per attempt
//! - TCP keep-alive: 5 seconds
//! - Backoff: 250ms doubling up to 4 seconds, down-jitter up to 25%
//!
//! # Retryable Conditions
//!
//! - HTTP 408, 409, 429, 5xx
//! - Connection, timeout and request-construction errors
//! - `Retry-After` / `Retry-After-Ms` replace the computed backoff when valid
//!
//! Retry only covers establishing the stream. A stream that was established
//! and later ends is not reopened.

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, header::HeaderMap};

#[derive(Debug, Clone)]
pub struct ConnectPolicy {
    /// Total connection attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub connect_timeout: Duration,
    pub keep_alive: Duration,
    /// Backoff before the second attempt.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Down-jitter factor (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            connect_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(5),
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            jitter_factor: 0.25,
        }
    }
}

/// Parse `Retry-After-Ms` or `Retry-After` headers.
///
/// Returns `Some(duration)` if a valid value is found and `0 < duration < 60s`.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.parse::<f64>()
    {
        let duration = Duration::from_secs_f64(ms / 1000.0);
        if duration > Duration::ZERO && duration < Duration::from_secs(60) {
            return Some(duration);
        }
    }

    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if duration > Duration::ZERO && duration < Duration::from_secs(60) {
            return Some(duration);
        }
    }

    None
}

#[must_use]
pub fn should_retry(status: StatusCode) -> bool {
    matches!(status.as_u16(), 408 | 409 | 429 | 500..=599)
}

/// Backoff before attempt `backoff_step + 2`.
#[must_use]
pub fn calculate_retry_delay(
    backoff_step: u32,
    policy: &ConnectPolicy,
    headers: Option<&HeaderMap>,
) -> Duration {
    if let Some(headers) = headers
        && let Some(delay) = parse_retry_after(headers)
    {
        return delay;
    }

    let base = policy.initial_delay.as_secs_f64() * 2.0_f64.powi(backoff_step.min(30) as i32);
    let capped = base.min(policy.max_delay.as_secs_f64());

    let jitter = 1.0 - rand::random::<f64>() * policy.jitter_factor;
    Duration::from_secs_f64(capped * jitter)
}

/// Result of trying to open a stream.
#[derive(Debug)]
pub enum ConnectOutcome {
    /// 2xx response; its body is the stream.
    Established(Response),
    /// Non-2xx status that was not retryable, or still failing on the last attempt.
    Rejected { response: Response, attempts: u32 },
    /// Transport failure on the last attempt, or one that cannot be retried.
    ConnectionError {
        attempts: u32,
        source: reqwest::Error,
    },
}

/// Send the request built by `build_request` until a stream is established
/// or `policy.max_attempts` is exhausted.
pub async fn connect_with_retry<F>(build_request: F, policy: &ConnectPolicy) -> ConnectOutcome
where
    F: Fn() -> RequestBuilder,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let last_attempt = attempt >= max_attempts;

        match build_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return ConnectOutcome::Established(response);
                }
                if last_attempt || !should_retry(status) {
                    return ConnectOutcome::Rejected {
                        response,
                        attempts: attempt,
                    };
                }

                let delay = calculate_retry_delay(attempt - 1, policy, Some(response.headers()));
                tracing::warn!(
                    status = %status,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Stream rejected, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if last_attempt || !is_retryable_error(&e) {
                    return ConnectOutcome::ConnectionError {
                        attempts: attempt,
                        source: e,
                    };
                }

                let delay = calculate_retry_delay(attempt - 1, policy, None);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Stream connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        attempt += 1;
    }
}

fn is_retryable_error(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}
