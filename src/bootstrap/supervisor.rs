use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::BootstrapConfig;

/// Delay schedule between bootstrap attempts.
///
/// With `multiplier == 1` (the default) every retry waits `initial_delay`;
/// larger multipliers grow the delay geometrically up to `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1,
        }
    }

    /// Delay before retry number `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay.max(self.initial_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(5))
    }
}

impl From<&BootstrapConfig> for RetryPolicy {
    fn from(config: &BootstrapConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.retry_delay_secs),
            max_delay: Duration::from_secs(config.retry_max_delay_secs),
            multiplier: config.retry_multiplier,
        }
    }
}

/// Re-runs a whole startup sequence until it succeeds or is cancelled.
///
/// Attempts share no state: each call to `operation` starts from scratch.
/// There is no attempt limit.
#[derive(Debug, Clone, Default)]
pub struct RetrySupervisor {
    policy: RetryPolicy,
}

impl RetrySupervisor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns `None` if cancelled before an attempt succeeded.
    #[tracing::instrument(skip(self, cancel, operation))]
    pub async fn run<F, Fut, T, E>(
        &self,
        name: &str,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return None,
                outcome = operation() => outcome,
            };

            match outcome {
                Ok(value) => {
                    info!(attempts = attempt + 1, "{} complete", name);
                    return Some(value);
                }
                Err(e) => {
                    let delay = self.policy.delay_for(attempt);
                    error!(
                        attempt = attempt + 1,
                        retry_in_ms = delay.as_millis() as u64,
                        error = %e,
                        "{} failed, retrying",
                        name
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}
