//! Bounded waiting
//!
//! Polls a condition at a fixed interval until it holds or a deadline
//! passes, surfacing a typed timeout instead of looping forever.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Polling interval and overall deadline for a bounded wait
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

/// The condition did not hold within the deadline
#[derive(Debug, Error)]
#[error("condition not met within {waited:?}")]
pub struct WaitTimeout {
    pub waited: Duration,
}

/// Poll `probe` until it yields `Some`, re-checking every `policy.interval`.
pub async fn wait_until<T, F, Fut>(policy: RetryPolicy, mut probe: F) -> Result<T, WaitTimeout>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = probe().await {
            return Ok(value);
        }
        if start.elapsed() >= policy.timeout {
            return Err(WaitTimeout {
                waited: start.elapsed(),
            });
        }
        tokio::time::sleep(policy.interval).await;
    }
}
