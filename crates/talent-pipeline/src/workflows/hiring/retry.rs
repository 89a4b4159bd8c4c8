use std::time::Duration;

use tracing::debug;

use super::errors::HiringError;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(25);
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Bounded exponential backoff for retryable failures.
///
/// A retried attempt re-reads state and re-runs its guards, so a lost compare-and-set resolves to
/// either success or the domain error the winning write now implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn no_delay(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
        self.base_delay.saturating_mul(1 << shift)
    }

    /// Backoff sleeps the calling thread; async callers run this on the blocking pool.
    pub fn run<T, F>(&self, operation: &'static str, mut attempt: F) -> Result<T, HiringError>
    where
        F: FnMut() -> Result<T, HiringError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut tries = 0;

        loop {
            tries += 1;
            match attempt() {
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    let delay = self.delay_for(tries);
                    debug!(
                        operation,
                        attempt = tries,
                        code = err.code(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying hiring operation"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
                Err(HiringError::Contention { entity }) => {
                    return Err(HiringError::TransientStorage(format!(
                        "{entity} kept changing underneath {operation} after {tries} attempts"
                    )));
                }
                other => return other,
            }
        }
    }
}
