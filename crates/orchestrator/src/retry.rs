//! Explicit retry policy applied uniformly around agent calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    /// One retry after 500ms.
    fn default() -> Self {
        Self {
            max_retries: 1,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 5_000,
        }
    }
}

/// Typed result of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Failed { error: AgentError, attempts: u32 },
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt` (0-indexed; the first attempt has none).
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        if attempt == 0 {
            return 0;
        }
        let delay =
            self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(attempt as i32 - 1);
        (delay as u64).min(self.max_backoff_ms)
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or the retry budget is spent. The argument passed to `operation` is
    /// the 0-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        operation_name: &str,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, AgentError>>,
    {
        let mut attempt = 0;

        loop {
            match operation(attempt).await {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt + 1,
                    }
                }
                Err(error) => {
                    if !error.is_retryable() || !self.should_retry(attempt) {
                        return RetryOutcome::Failed {
                            error,
                            attempts: attempt + 1,
                        };
                    }

                    attempt += 1;
                    let wait_ms = self.backoff_ms(attempt);
                    warn!(
                        operation = operation_name,
                        error = %error,
                        wait_ms,
                        attempt,
                        max_retries = self.max_retries,
                        "Retrying after failure"
                    );

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            return RetryOutcome::Failed {
                                error: AgentError::Cancelled,
                                attempts: attempt,
                            };
                        }
                        _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                    }
                }
            }
        }
    }
}
