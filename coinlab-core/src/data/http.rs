//! Blocking JSON-over-HTTP with retry, backoff and circuit breaking.

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Longest server-requested `Retry-After` honored before a retry.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Retry knobs for [`JsonClient`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first (0 = single attempt).
    pub max_retries: u32,
    /// Backoff before the first retry; doubled on each further retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct JsonClient {
    client: reqwest::blocking::Client,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl JsonClient {
    pub fn new(timeout: Duration, breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("coinlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// GET `url` with `query` and decode the JSON body.
    ///
    /// 403 trips the breaker. 429, 5xx and transport failures are retried;
    /// a 429 `Retry-After` (capped at [`MAX_RETRY_AFTER`]) replaces the
    /// backoff before the next attempt. Other non-success statuses fail
    /// without retry.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, DataError> {
        let mut last_error = None;
        let mut requested_wait: Option<Duration> = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                let backoff = self.retry.base_delay * 2u32.pow(attempt - 1);
                let wait = requested_wait
                    .take()
                    .map_or(backoff, |w| w.min(MAX_RETRY_AFTER));
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
            }
            if !self.breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }

            debug!(url, attempt, "GET");
            let resp = match self.client.get(url).query(query).send() {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(if e.is_timeout() {
                        DataError::Timeout(e.to_string())
                    } else {
                        DataError::NetworkUnreachable(e.to_string())
                    });
                    continue;
                }
            };

            let status = resp.status();
            if status == StatusCode::FORBIDDEN {
                self.breaker.trip();
                warn!(url, "provider refused access, circuit breaker open");
                return Err(DataError::CircuitBreakerTripped);
            }
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                requested_wait = retry_after_secs.map(Duration::from_secs);
                last_error = Some(DataError::RateLimited { retry_after_secs });
                continue;
            }
            if status.is_server_error() {
                last_error = Some(DataError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
                continue;
            }
            if !status.is_success() {
                return Err(DataError::HttpStatus {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }

            return resp.json::<T>().map_err(|e| {
                DataError::ResponseFormatChanged(format!("failed to decode {url}: {e}"))
            });
        }

        Err(last_error.unwrap_or_else(|| DataError::NetworkUnreachable("no attempt made".into())))
    }
}
