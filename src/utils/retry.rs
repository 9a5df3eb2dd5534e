use anyhow::Result;
use log::{debug, info, warn};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based), capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let millis = self.base_delay.as_millis() as f64 * factor;
        Duration::from_millis(millis as u64).min(self.max_delay)
    }
}

/// A successful value and the attempt that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-transient error, or
/// `max_attempts` is used up. The operation receives the 1-based attempt number.
pub async fn retry_with_exponential_backoff<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<Retried<T>>
where
    F: Fn(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!("Operation succeeded on attempt {}", attempt);
                }
                return Ok(Retried { value, attempts: attempt });
            }
            Err(e) if attempt >= max_attempts => {
                warn!("Operation failed after {} attempts: {}", max_attempts, e);
                return Err(e.context(format!("Failed after {} retry attempts", max_attempts)));
            }
            Err(e) if is_transient_error(&e) => {
                let delay = config.delay_for(attempt);
                debug!("Attempt {} failed transiently, retrying in {:?}: {}", attempt, delay, e);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!("Attempt {} failed with non-transient error, not retrying: {}", attempt, e);
                return Err(e);
            }
        }
    }
}

pub fn is_transient_error(error: &anyhow::Error) -> bool {
    let message = format!("{:#}", error).to_lowercase();

    const MARKERS: &[&str] = &[
        "timeout",
        "timed out",
        "connection",
        "temporary",
        "rate limit",
        "too many requests",
        "service unavailable",
        "bad gateway",
        "429",
        "502",
        "503",
        "504",
    ];

    MARKERS.iter().any(|marker| message.contains(marker))
}
