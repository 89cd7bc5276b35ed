//! Retry Controller: bounded exponential backoff and model escalation.
//!
//! The two wrappers compose: pipelines run `with_retry` inside each
//! `with_model_escalation` attempt, giving retry-then-escalate semantics.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::AiError;
use crate::llm_client::EndpointConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOptions {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1_000),
            max_delay: Duration::from_millis(16_000),
        }
    }
}

impl RetryOptions {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// `min(max_delay, base_delay * 2^attempt)`, `attempt` counted from 0.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    fn delay_after(&self, error: &AiError, attempt: u32) -> Duration {
        match error.retry_after_ms() {
            Some(ms) => Duration::from_millis(ms),
            None => self.backoff_for(attempt),
        }
    }
}

/// Runs `operation` until it succeeds, fails non-transiently, or
/// `max_retries` retries are spent. Worst case: `max_retries + 1` calls.
pub async fn with_retry<T, F, Fut>(mut operation: F, options: RetryOptions) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt: u32 = 0;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        if !error.is_retryable() {
            debug!(kind = %error.kind(), "Non-transient failure, not retrying");
            return Err(error);
        }

        if attempt >= options.max_retries {
            warn!(
                kind = %error.kind(),
                attempts = attempt + 1,
                "Retries exhausted: {error}"
            );
            return Err(error);
        }

        let delay = options.delay_after(&error, attempt);
        warn!(
            kind = %error.kind(),
            attempt = attempt + 1,
            max_retries = options.max_retries,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying: {error}"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Runs `operation` against `primary`; on any error runs it once against
/// `fallback`. When both fail the fallback's error is returned.
pub async fn with_model_escalation<T, F, Fut>(
    mut operation: F,
    primary: EndpointConfig,
    fallback: EndpointConfig,
) -> Result<T, AiError>
where
    F: FnMut(EndpointConfig) -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let primary_model = primary.model.clone();
    match operation(primary).await {
        Ok(value) => Ok(value),
        Err(error) => {
            warn!(
                endpoint = %fallback.id,
                from = %primary_model,
                to = %fallback.model,
                kind = %error.kind(),
                "Escalating to fallback model: {error}"
            );
            operation(fallback).await
        }
    }
}
