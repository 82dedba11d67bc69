//! Bounded retry with exponential backoff for generative model calls.

use orgmem_core::{AppError, AppResult, GenerationFailure};
use std::future::Future;
use std::time::Duration;

/// Outcome of a single call, as seen by the retry loop.
#[derive(Debug)]
pub enum Attempt<T> {
    Ok(T),
    /// Rate limit or timeout; worth another try
    Retryable(AppError),
    /// Anything else; give up immediately
    Fatal(AppError),
}

impl<T> Attempt<T> {
    pub fn classify(result: AppResult<T>) -> Self {
        match result {
            Ok(value) => Self::Ok(value),
            Err(AppError::Provider(e)) if e.is_transient() => {
                Self::Retryable(AppError::Provider(e))
            }
            Err(e) => Self::Fatal(e),
        }
    }
}

/// Retry ceiling and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Wait after failed attempt `attempt` (1-based): base, doubling, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `call` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `call` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(&self, mut call: F) -> Result<T, GenerationFailure>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match Attempt::classify(call(attempt).await) {
                Attempt::Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Generative model call succeeded after retry");
                    }
                    return Ok(value);
                }
                Attempt::Retryable(e) if attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient generative model failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Attempt::Retryable(e) => {
                    tracing::error!(attempts = attempt, error = %e, "Retries exhausted");
                    return Err(GenerationFailure::Overloaded { attempts: attempt });
                }
                Attempt::Fatal(e) => {
                    tracing::error!(attempt, error = %e, "Generative model call failed");
                    return Err(into_failure(e));
                }
            }
        }
    }
}

/// Map a non-retryable error to the generation outcome reported to callers.
pub(crate) fn into_failure(err: AppError) -> GenerationFailure {
    match err {
        AppError::Provider(p) => GenerationFailure::Provider(p.to_string()),
        AppError::Generation(failure) => failure,
        other => GenerationFailure::Unexpected(other.to_string()),
    }
}
