//! Bounded retry with exponential backoff for chunk loads.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::MigrationConfig;
use crate::error::{MigrateError, Result};

/// Retry policy for one chunk load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self {
            max_attempts: config.max_chunk_failures.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of one load attempt.
#[derive(Debug)]
pub enum LoadOutcome {
    Success(u64),
    /// Worth another attempt.
    Retryable(MigrateError),
    /// Retrying cannot help: the target table is missing or the session is gone.
    Fatal(MigrateError),
}

impl From<Result<u64>> for LoadOutcome {
    fn from(result: Result<u64>) -> Self {
        match result {
            Ok(n) => LoadOutcome::Success(n),
            Err(e) if e.is_missing_table() => LoadOutcome::Fatal(e),
            Err(e @ MigrateError::Connection { .. }) => LoadOutcome::Fatal(e),
            Err(e) => LoadOutcome::Retryable(e),
        }
    }
}

/// Run `op` until it succeeds, fails fatally, or exhausts the policy.
///
/// Returns the last error on exhaustion.
pub async fn load_with_retry<F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<u64>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let mut attempt = 1;
    loop {
        match LoadOutcome::from(op().await) {
            LoadOutcome::Success(n) => return Ok(n),
            LoadOutcome::Fatal(e) => return Err(e),
            LoadOutcome::Retryable(e) if attempt >= policy.max_attempts => {
                warn!("{}: giving up after {} attempts: {}", label, attempt, e);
                return Err(e);
            }
            LoadOutcome::Retryable(e) => {
                let delay = policy.delay_for(attempt);
                warn!(
                    "{}: attempt {}/{} failed, retrying in {:?}: {}",
                    label, attempt, policy.max_attempts, delay, e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
