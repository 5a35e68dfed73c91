//! Fixed-interval polling with cancellation support.
//!
//! Used to wait for an instance to leave its transitional statuses. The
//! overall deadline belongs to the enclosing stage (see [`crate::timeout`]),
//! so polling itself only knows about its interval and the stage's
//! cancellation token.

use backon::{BackoffBuilder, ConstantBuilder};
use imgtest_common::defaults::STATUS_POLL_INTERVAL_SECS;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Configuration for status polling.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two checks
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(STATUS_POLL_INTERVAL_SECS),
        }
    }
}

/// Poll `check` until it yields a value.
///
/// The first check runs immediately; each further check runs one interval
/// after the previous one returned.
///
/// # Arguments
/// * `config` - Poll configuration
/// * `cancel` - Cancellation token of the enclosing stage
/// * `check` - Returns `Ok(Some(v))` when done, `Ok(None)` to poll again
/// * `resource_name` - Name for logging
///
/// # Returns
/// * `Ok(Some(v))` - `check` produced a value
/// * `Ok(None)` - cancelled before a value was produced
/// * `Err(e)` - `check` failed; returned unchanged
pub async fn poll_until<T, E, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut check: F,
    resource_name: &str,
) -> Result<Option<T>, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut delays = ConstantBuilder::default()
        .with_delay(config.interval)
        .without_max_times()
        .build();
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        if cancel.is_cancelled() {
            debug!(resource = %resource_name, attempts, "Polling cancelled");
            return Ok(None);
        }

        if let Some(value) = check().await? {
            debug!(resource = %resource_name, attempts, "Resource ready");
            return Ok(Some(value));
        }

        let delay = delays.next().unwrap_or(config.interval);
        debug!(
            resource = %resource_name,
            attempt = attempts,
            delay_ms = delay.as_millis(),
            "Resource not ready, polling again"
        );

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                debug!(resource = %resource_name, attempts, "Polling cancelled");
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_first_check_is_immediate() {
        let start = tokio::time::Instant::now();
        let result: Result<_, anyhow::Error> = poll_until(
            &PollConfig::default(),
            &CancellationToken::new(),
            || async { Ok(Some("ready")) },
            "instance",
        )
        .await;
        assert_eq!(result.unwrap(), Some("ready"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_at_fixed_interval() {
        let calls = Cell::new(0u32);
        let start = tokio::time::Instant::now();
        let result: Result<_, anyhow::Error> = poll_until(
            &PollConfig::default(),
            &CancellationToken::new(),
            || {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move { Ok((n == 4).then_some(n)) }
            },
            "instance",
        )
        .await;

        assert_eq!(result.unwrap(), Some(4));
        // Three sleeps of three seconds each
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(9));
        assert!(elapsed < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_error_stops_polling() {
        let calls = Cell::new(0u32);
        let result: Result<Option<()>, String> = poll_until(
            &PollConfig::default(),
            &CancellationToken::new(),
            || {
                calls.set(calls.get() + 1);
                async { Err("api unavailable".to_string()) }
            },
            "instance",
        )
        .await;

        assert_eq!(result.unwrap_err(), "api unavailable");
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_polling() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(4)).await;
            trigger.cancel();
        });

        let result: Result<Option<()>, anyhow::Error> = poll_until(
            &PollConfig::default(),
            &cancel,
            || async { Ok(None) },
            "instance",
        )
        .await;
        assert_eq!(result.unwrap(), None);
    }
}
