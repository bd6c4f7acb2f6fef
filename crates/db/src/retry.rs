//! Bounded retry with exponential backoff for store operations.
//!
//! Two failure classes are worth another attempt: transient SQLite errors
//! (SQLITE_BUSY, SQLITE_LOCKED and the IOERR family) and optimistic
//! conflicts that a caller reports through [`Retryable`]. Anything else is
//! returned immediately.

use std::{fmt::Debug, future::Future, time::Duration};

use rand::Rng;
use sqlx::Error as SqlxError;

/// Classifies an error as worth retrying.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SqlxError {
    fn is_retryable(&self) -> bool {
        is_retryable_error(self)
    }
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Caps the exponential growth.
    pub max_delay_ms: u64,
    /// Fraction (0.0 to 1.0) of the delay added as random jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 20,
            max_delay_ms: 1000,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped_delay = base_delay.min(self.max_delay_ms);

        let jitter_range = (capped_delay as f64 * self.jitter_factor.clamp(0.0, 1.0)) as u64;
        let jitter = if jitter_range > 0 {
            rand::rng().random_range(0..jitter_range)
        } else {
            0
        };

        Duration::from_millis(capped_delay + jitter)
    }
}

/// Check if an error is a transient SQLite error that should be retried.
///
/// SQLite error codes considered retryable:
/// - 5 = SQLITE_BUSY (database is locked by another connection)
/// - 6 = SQLITE_LOCKED (table is locked within a transaction)
/// - 10 = SQLITE_IOERR and its extended codes (522, 778, ...)
///
/// Pool acquisition timeouts are transient as well.
pub fn is_retryable_error(e: &SqlxError) -> bool {
    match e {
        SqlxError::PoolTimedOut => true,
        SqlxError::Database(db_err) => {
            let Some(code) = db_err.code() else {
                return false;
            };
            let code_str = code.as_ref();
            if matches!(code_str, "5" | "6" | "10") {
                return true;
            }
            // Extended codes keep the primary code in the low byte, e.g. 517 = BUSY_SNAPSHOT.
            code_str
                .parse::<u32>()
                .map(|n| n > 255 && matches!(n & 0xFF, 5 | 6 | 10))
                .unwrap_or(false)
        }
        _ => false,
    }
}

/// Run `f` until it succeeds, fails with a non-retryable error, or
/// `config.max_attempts` attempts have been made.
///
/// ```ignore
/// let moved = with_retry(&RetryConfig::default(), "move_card", || async {
///     ledger.try_move(board_id, card_id, status, position).await
/// })
/// .await?;
/// ```
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut f: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Debug,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match f().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = config.calculate_delay(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?e,
                    "Retryable failure, backing off"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if attempt > 0 {
                    tracing::error!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        error = ?e,
                        "Operation failed after all retries"
                    );
                }
                return Err(e);
            }
        }
    }
}
