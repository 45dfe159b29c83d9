//! Bounded retry with capped backoff and jitter
//!
//! A single combinator parameterized by max attempts, a backoff function,
//! and a retryable-error predicate, shared by the blockhash provider and
//! the signature status poller instead of per-site while-loops.

use crate::errors::EngineError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration with jitter
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial attempt)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base backoff delay in milliseconds, doubled each attempt
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the computed backoff, jitter excluded
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound of the uniform jitter added to every delay
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    5_000
}
fn default_jitter_ms() -> u64 {
    1_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

impl RetryConfig {
    /// Backoff delay for a given attempt (0-indexed): `base * 2^attempt`
    /// capped at `max_delay_ms`, plus uniform jitter to avoid
    /// thundering-herd against the RPC endpoint.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = (self.base_delay_ms as f64) * 2_f64.powi(attempt.min(32) as i32);
        let capped = exp.min(self.max_delay_ms as f64) as u64;
        let jitter = if self.jitter_ms > 0 {
            fastrand::u64(0..=self.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(capped + jitter)
    }
}

/// Retry an async operation with backoff
///
/// The predicate decides which errors are worth retrying; a non-retryable
/// error fails immediately. The last error is returned once the attempt
/// budget is exhausted.
pub async fn retry_with_backoff<F, Fut, T, P>(
    operation_name: &str,
    config: &RetryConfig,
    retryable: P,
    mut operation: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
    P: Fn(&EngineError) -> bool,
{
    let started = std::time::Instant::now();
    let mut last_error = None;

    for attempt in 0..config.max_attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !retryable(&err) {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "Permanent error, not retrying"
                    );
                    return Err(err);
                }

                if attempt + 1 < config.max_attempts {
                    let backoff = config.delay_for(attempt);
                    debug!(
                        operation = operation_name,
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "Transient error, backing off before retry"
                    );
                    last_error = Some(err);
                    sleep(backoff).await;
                } else {
                    warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = %err,
                        "All retry attempts exhausted"
                    );
                    last_error = Some(err);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| EngineError::internal("retry exhausted without recorded error")))
}

/// Inter-poll backoff for the signature status poller
///
/// `delay = min(initial * 1.5^attempt + jitter(0..jitter_ms), max_delay_ms)`,
/// the cap applied after jitter so the delay never exceeds the ceiling.
#[derive(Debug, Clone)]
pub struct PollBackoff {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl PollBackoff {
    pub fn new(initial_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> Self {
        Self {
            initial_delay_ms,
            max_delay_ms,
            jitter_ms,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = (self.initial_delay_ms as f64) * 1.5_f64.powi(attempt.min(64) as i32);
        let jitter = if self.jitter_ms > 0 {
            fastrand::u64(0..=self.jitter_ms)
        } else {
            0
        } as f64;
        let delay = (base + jitter).min(self.max_delay_ms as f64);
        Duration::from_millis(delay as u64)
    }

    /// Expected delay ignoring jitter, for bound reasoning in tests
    pub fn expected_delay_ms(&self, attempt: u32) -> u64 {
        let base = (self.initial_delay_ms as f64) * 1.5_f64.powi(attempt.min(64) as i32);
        base.min(self.max_delay_ms as f64) as u64
    }
}

impl Default for PollBackoff {
    fn default() -> Self {
        Self::new(1_000, 10_000, 1_000)
    }
}
