use std::{future::Future, time::Duration};

use log::{debug, warn};

/// A bounded exponential backoff schedule: `base * 2^n` per retry, capped at `max_delay`, for at most
/// `max_attempts` total attempts. Deliberately deterministic so that tests can pin the schedule down.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self { max_attempts: 4, base_delay: Duration::from_millis(250), max_delay: Duration::from_secs(5) }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), base_delay, max_delay }
    }

    /// No delays at all; useful in tests and for callers that want a single attempt.
    pub fn no_retries() -> Self {
        Self { max_attempts: 1, base_delay: Duration::ZERO, max_delay: Duration::ZERO }
    }

    /// The delay to sleep after the attempt with the given zero-based index fails.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// The final error of a retry loop, together with how many attempts were actually burned.
#[derive(Debug, Clone)]
pub struct RetriesExhausted<E> {
    pub error: E,
    pub attempts: u32,
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the attempt budget is exhausted. The final
/// error comes back with the attempt count; callers wrap it in their own "retries exhausted" variant. The budget
/// is a hard bound: no retry loop here ever outlives the request that started it.
pub async fn retry_transient<T, E, F, Fut, P>(
    policy: &BackoffPolicy,
    mut op: F,
    is_transient: P,
    label: &str,
) -> Result<T, RetriesExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient(&e) && attempt + 1 < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!("⏳️ {label} failed (attempt {} of {}): {e}. Retrying in {delay:?}", attempt + 1, policy.max_attempts);
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(e) => {
                debug!("⏳️ {label} giving up after {} attempt(s): {e}", attempt + 1);
                return Err(RetriesExhausted { error: e, attempts: attempt + 1 });
            },
        }
    }
}
