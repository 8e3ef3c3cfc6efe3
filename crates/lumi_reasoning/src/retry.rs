//! Backoff for chat-completion requests.
//!
//! Rate limits, gateway hiccups and dropped connections are retried; any
//! other failed status is returned at once.

use anyhow::{anyhow, Result};
use rand::Rng;
use reqwest::{Response, StatusCode};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    #[cfg(test)]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Pause before retry number `retry` (1-based), without jitter.
    fn base_delay(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let factor = self.backoff_factor.max(1.0).powi(retry as i32 - 1);
        if self.initial_delay.as_secs_f64() * factor >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        self.initial_delay.mul_f64(factor)
    }

    /// Base delay plus up to a quarter of it at random.
    fn delay_with_jitter(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        let spread = (base.as_millis() / 4) as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        base + Duration::from_millis(jitter)
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS
    ) || matches!(status.as_u16(), 500 | 502 | 503 | 504)
}

/// Run `send` until it yields a successful response, giving up on a
/// non-transient status or after `max_attempts`.
pub async fn with_retry<F, Fut>(config: &RetryConfig, label: &str, send: F) -> Result<Response>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<Response>>,
{
    let attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let failure = match send().await {
            Ok(response) if response.status().is_success() => {
                if attempt > 1 {
                    tracing::info!("{}: succeeded after {} attempts", label, attempt);
                }
                return Ok(response);
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if !is_transient(status) {
                    return Err(anyhow!("{} API error ({}): {}", label, status, body));
                }
                let preview: String = body.chars().take(200).collect();
                format!("status {}: {}", status, preview)
            }
            Err(e) => format!("{:#}", e),
        };

        if attempt >= attempts {
            return Err(anyhow!(
                "{}: gave up after {} attempts, last failure: {}",
                label,
                attempts,
                failure
            ));
        }

        let pause = config.delay_with_jitter(attempt);
        tracing::warn!(
            "{}: attempt {}/{} failed ({}), retrying in {}ms",
            label,
            attempt,
            attempts,
            failure,
            pause.as_millis()
        );
        tokio::time::sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        assert!(is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_transient(StatusCode::BAD_GATEWAY));
        assert!(is_transient(StatusCode::REQUEST_TIMEOUT));
        assert!(!is_transient(StatusCode::UNAUTHORIZED));
        assert!(!is_transient(StatusCode::NOT_FOUND));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let cfg = RetryConfig {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            backoff_factor: 2.0,
        };
        assert_eq!(cfg.base_delay(1), Duration::from_millis(100));
        assert_eq!(cfg.base_delay(2), Duration::from_millis(200));
        assert_eq!(cfg.base_delay(3), Duration::from_millis(300));
        assert_eq!(cfg.base_delay(4), Duration::from_millis(300));

        let jittered = cfg.delay_with_jitter(1);
        assert!(jittered >= Duration::from_millis(100));
        assert!(jittered <= Duration::from_millis(125));
    }

    #[test]
    fn test_none_is_single_attempt() {
        assert_eq!(RetryConfig::none().max_attempts, 1);
    }
}
