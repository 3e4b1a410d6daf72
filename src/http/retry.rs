//! Exponential backoff with jitter, used by both unary and SSE-handshake retries.

use std::time::Duration;

use rand::Rng;

use crate::error::LlmError;

/// Retry policy configuration: attempt cap, delay curve, and jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before the given attempt (0-indexed), `base * multiplier^attempt` clamped to
    /// `max_delay`, with up to `jitter_factor` of symmetric noise applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped = Duration::from_millis(base_ms as u64).min(self.max_delay);
        self.jitter(capped)
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 {
            return delay;
        }
        let range = delay.as_millis() as f64 * self.jitter_factor;
        let noise = rand::thread_rng().gen_range(-range..=range);
        let jittered = (delay.as_millis() as f64 + noise).max(0.0);
        Duration::from_millis(jittered as u64)
    }
}

/// Runs `operation` under `policy`, retrying retryable [`LlmError`]s and honoring any
/// server-provided `retry_after` hint over the computed backoff delay.
///
/// `idempotent` gates retry of connection-level failures (`Network`/`Timeout`): a
/// server-declared retriable status (`429`/`5xx`, surfaced as `LlmError::Api`) is
/// always eligible regardless of method, since the server itself vouched for the
/// retry, but replaying a `POST` after a timeout or a dropped connection risks a
/// duplicate side effect and is only safe for idempotent methods.
pub async fn retry_with<F, Fut, T>(policy: &RetryPolicy, idempotent: bool, mut operation: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut last_error = None;
    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                let retryable = match &error {
                    LlmError::Network(_) | LlmError::Timeout(_) => idempotent,
                    _ => error.is_retryable(),
                };
                if !retryable || attempt + 1 == policy.max_attempts {
                    return Err(error);
                }
                let delay = error.retry_after().unwrap_or_else(|| policy.delay_for(attempt));
                last_error = Some(error);
                tokio::time::sleep(delay).await;
            }
        }
    }
    Err(last_error.unwrap_or_else(|| LlmError::Internal("retry loop exited without error".into())))
}
