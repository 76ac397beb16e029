//! Retry policy constants

use std::time::Duration;

/// Maximum number of retries for a failed page request.
/// Three retries with exponential backoff recovers from transient network
/// issues and short throttling bursts without risking an unbounded loop
/// under sustained 429 responses.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum backoff delay in milliseconds.
/// Caps exponential growth so a stalled endpoint never parks a harvest for
/// minutes between attempts.
pub const MAX_BACKOFF_MS: u64 = 30_000;

/// Calculate the exponential backoff delay for a retry attempt.
pub fn calculate_backoff(retry_count: u32) -> Duration {
    let delay_ms = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    Duration::from_millis(delay_ms.min(MAX_BACKOFF_MS))
}
