//! Bounded retry for transient store failures.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::persistence::{StoreError, StoreResult};

const BASE_RETRY_DELAY_MS: u64 = 25;
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Runs `op` up to `attempts` times while it fails with a retryable
/// [`StoreError`], backing off exponentially between attempts.
///
/// Non-retryable errors and the last failure are returned unchanged.
///
/// # Errors
///
/// Returns the final [`StoreError`] once attempts are exhausted.
pub async fn retry_store<T, F, Fut>(operation: &str, attempts: u32, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let attempts = attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(operation, attempt, "store call succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_retryable() && attempt < attempts => {
                let backoff_multiplier = 1u64 << attempt.saturating_sub(1).min(4);
                let wait = Duration::from_millis(BASE_RETRY_DELAY_MS * backoff_multiplier)
                    .min(MAX_RETRY_DELAY);
                tracing::warn!(
                    operation,
                    attempt,
                    wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient store failure; retrying"
                );
                sleep(wait).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Returns `true` when the gig or request table is not provisioned yet.
/// Callers read that as an empty or absent result.
pub(crate) fn is_unprovisioned(err: &StoreError) -> bool {
    matches!(err, StoreError::NotProvisioned(_))
}
