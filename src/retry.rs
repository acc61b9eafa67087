// Bounded exponential-backoff retry for external generation calls.
//
// This is the only retry mechanism in the crate; processors and the sequence
// engine treat a returned error as terminal for that unit of work.

use std::future::Future;
use std::time::Duration;

use crate::error::EngineError;

/// Budget for cheap text operations.
pub const TEXT_RETRIES: u32 = 3;
pub const TEXT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Budget for expensive image generation.
pub const IMAGE_RETRIES: u32 = 2;
pub const IMAGE_BASE_DELAY: Duration = Duration::from_secs(2);

/// Video operations are long-running and externally polled; retrying a
/// multi-minute operation is wasteful.
pub const VIDEO_RETRIES: u32 = 1;
pub const VIDEO_BASE_DELAY: Duration = Duration::from_secs(2);

/// Invoke `op` up to `retries` times, sleeping `base_delay * 2^attempt`
/// between transient failures. Non-transient errors are returned immediately;
/// after the budget is exhausted the last error is returned.
pub async fn call_with_retry<T, F, Fut>(
    mut op: F,
    retries: u32,
    base_delay: Duration,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut last_err: Option<EngineError> = None;

    for attempt in 0..retries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }
                if attempt + 1 < retries {
                    let delay = base_delay * 2u32.pow(attempt);
                    log::warn!(
                        "transient generation error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        retries,
                        delay,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(err);
            }
        }
    }

    // Reachable with an empty `last_err` only when `retries` is zero.
    Err(last_err.unwrap_or_else(|| EngineError::RequestFailed("max retries reached".into())))
}
