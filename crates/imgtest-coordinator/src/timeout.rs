//! Per-stage deadline enforcement with cancellation.
//!
//! Each provisioning stage runs under [`run_with_timeout`]. A watchdog task
//! cancels the stage's [`CancellationToken`] once the deadline passes; the
//! guard then drops the in-flight future, runs the timeout handler and
//! reports [`EnvError::Timeout`].

use crate::error::EnvError;
use crate::orchestrator::Stage;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Cancel `token` once `deadline` has elapsed.
fn spawn_watchdog(token: CancellationToken, deadline: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(deadline).await;
        token.cancel();
    })
}

/// Run `work` with a wall-clock deadline.
///
/// # Arguments
/// * `stage` - Stage being guarded (for logs and the timeout error)
/// * `deadline` - Time budget; a zero deadline fails without starting `work`
/// * `work` - Receives the stage's cancellation token
/// * `on_timeout` - Runs only when the deadline expires, before the error is returned
///
/// # Returns
/// * `Ok(T)` - `work` finished in time
/// * `Err(EnvError::Timeout)` - deadline expired (after `on_timeout` ran)
/// * `Err(e)` - `work` failed; returned unchanged and `on_timeout` is not called
pub async fn run_with_timeout<T, W, Fut, H, HFut>(
    stage: Stage,
    deadline: Duration,
    work: W,
    on_timeout: H,
) -> Result<T, EnvError>
where
    W: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, EnvError>>,
    H: FnOnce() -> HFut,
    HFut: Future<Output = ()>,
{
    let seconds = deadline.as_secs();
    if deadline.is_zero() {
        warn!(stage = %stage, "Stage has no time budget, not starting it");
        return Err(EnvError::Timeout { stage, seconds });
    }

    let token = CancellationToken::new();
    let watchdog = spawn_watchdog(token.clone(), deadline);

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => None,
        result = work(token.clone()) => Some(result),
    };
    watchdog.abort();

    match outcome {
        Some(result) => {
            debug!(stage = %stage, "Stage finished within deadline");
            result
        }
        None => {
            warn!(stage = %stage, timeout_secs = seconds, "Timeout!");
            on_timeout().await;
            Err(EnvError::Timeout { stage, seconds })
        }
    }
}
