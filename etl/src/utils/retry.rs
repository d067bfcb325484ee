use crate::utils::time::sleep_with_jitter;
use std::future::Future;
use tracing::warn;

/// Runs `operation` until it succeeds, fails with a permanent error, or the
/// retries are used up.
///
/// Only errors for which [`common::Error::is_transient`] holds are retried. The
/// delay doubles after every attempt and carries up to half of itself as jitter.
pub async fn retry_with_backoff<T, F, Fut>(
    mut retries: u32,
    base_delay_ms: u64,
    operation: F,
) -> common::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = common::Result<T>>,
{
    let mut delay = base_delay_ms;
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if retries == 0 || !e.is_transient() {
                    return Err(e);
                }

                warn!(attempt, retries_left = retries, delay_ms = delay, error = %e, "Retrying after transient failure");
                retries -= 1;
                attempt += 1;
                sleep_with_jitter(delay, delay / 2).await;
                delay = delay.saturating_mul(2);
            }
        }
    }
}
