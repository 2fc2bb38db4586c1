use crate::error::SheetsError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const MAX_ATTEMPTS: u32 = 5;

/// Run `op` until it succeeds, waiting `base * 2^attempt` between tries.
///
/// Errors that are not retryable are returned immediately.
pub async fn with_backoff<T, F, Fut>(what: &str, base: Duration, mut op: F) -> Result<T, SheetsError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SheetsError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < MAX_ATTEMPTS => {
                let delay = base * 2u32.pow(attempt);
                if matches!(e, SheetsError::RateLimited) {
                    warn!(
                        "{}: rate limited, waiting {:?} before retry {}/{}",
                        what,
                        delay,
                        attempt + 1,
                        MAX_ATTEMPTS - 1
                    );
                } else {
                    warn!("{} failed: {}. Retrying in {:?}", what, e, delay);
                }
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
