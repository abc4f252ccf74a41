//! Bounded polling

use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

use crate::error::E2eResult;

/// Poll `condition` until it reports `true` or `timeout` elapses.
///
/// The condition always runs at least once. Returns `Ok(false)` on timeout;
/// errors from the condition are returned immediately.
pub async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> E2eResult<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = E2eResult<bool>>,
{
    let start = Instant::now();
    let mut attempts = 0usize;

    loop {
        attempts += 1;

        if condition().await? {
            debug!("Condition met after {} attempt(s) ({:?})", attempts, start.elapsed());
            return Ok(true);
        }

        if start.elapsed() >= timeout {
            debug!("Condition not met after {} attempt(s), gave up after {:?}", attempts, timeout);
            return Ok(false);
        }

        sleep(interval).await;
    }
}
