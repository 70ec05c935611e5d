//! Retry for SQLite operations that hit lock contention.
//!
//! The CLI subcommands and a running service may open the same database file, so a write
//! can briefly see SQLITE_BUSY even with WAL and a busy timeout.

use std::future::Future;
use std::time::Duration;

/// Retries after the first attempt
pub const MAX_RETRIES: u32 = 3;

const BASE_DELAY_MS: u64 = 100;

/// SQLITE_BUSY, SQLITE_LOCKED and their extended codes
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().and_then(|c| c.parse::<i64>().ok());
            // primary result code lives in the low byte
            matches!(code.map(|c| c & 0xff), Some(5) | Some(6))
        }
        sqlx::Error::PoolTimedOut => true,
        _ => false,
    }
}

/// 100ms, 200ms, 400ms
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1)))
}

/// Run `operation`, retrying transient lock errors with exponential backoff
pub async fn with_retry<F, Fut, T>(what: &str, operation: F) -> Result<T, sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    operation = what,
                    attempt = attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Database busy, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
