//! # Conflict Retries
//!
//! Re-runs an operation that lost a race on the database.
//!
//! Only [`FulfilmentError::PersistenceConflict`] is retried: the write that
//! produced it made no changes, so running the whole operation again (reads
//! included) is safe. Everything else is returned on the first failure.
//!
//! ```text
//! attempt 1 ──► PersistenceConflict ──► sleep ~20ms
//! attempt 2 ──► PersistenceConflict ──► sleep ~40ms
//! attempt 3 ──► Ok(value)
//! ```

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total tries including the first one.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Runs once, no retries.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// `max_attempts` is used up.
    pub async fn run<T, F, Fut>(&self, operation: &'static str, mut op: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.create_backoff();
        let mut attempt = 1;

        loop {
            match op().await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let wait = backoff.next_backoff().unwrap_or(self.max_backoff);
                    warn!(
                        operation,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "Persistence conflict, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: self.initial_backoff,
            max_interval: self.max_backoff,
            // Attempts bound the loop, not wall time
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}
