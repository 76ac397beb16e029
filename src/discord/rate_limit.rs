//! Request spacing
//!
//! Discord throttles user-token clients aggressively below ~2 seconds between
//! requests, so every outbound request passes through a [`RateGovernor`] that
//! enforces a minimum gap between permitted turns.

use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::debug;

/// Default spacing for Discord requests.
pub const DEFAULT_DISCORD_DELAY: Duration = Duration::from_millis(2500);

/// Hard floor for Discord spacing; configured values below this are clamped
/// by [`crate::discord::DiscordClient`].
pub const DISCORD_MIN_DELAY: Duration = Duration::from_millis(2000);

/// Default spacing for YouTube requests.
pub const DEFAULT_YOUTUBE_DELAY: Duration = Duration::from_millis(1000);

/// Enforces a minimum gap between permitted request turns.
///
/// Tracks only the instant of the last permitted turn. One governor is owned
/// per client session; harvests never request concurrent turns, so the
/// internal lock is uncontended.
#[derive(Debug)]
pub struct RateGovernor {
    min_delay: Duration,
    last_turn: Mutex<Option<Instant>>,
}

impl RateGovernor {
    /// Create a governor with the given minimum inter-turn delay.
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_turn: Mutex::new(None),
        }
    }

    /// The configured minimum delay.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Wait until a full `min_delay` has elapsed since the last permitted
    /// turn, then record this turn.
    pub async fn await_turn(&self) {
        let wait = {
            let last = self.last_turn.lock().unwrap_or_else(|e| e.into_inner());
            last.and_then(|t| self.min_delay.checked_sub(t.elapsed()))
        };

        if let Some(wait) = wait {
            if !wait.is_zero() {
                debug!("rate limiting: sleeping for {:.2}s", wait.as_secs_f64());
                sleep(wait).await;
            }
        }

        self.mark_turn();
    }

    /// Record a turn without spacing.
    ///
    /// Used after honoring an explicit server-specified wait (post-429),
    /// which replaces the default spacing for that one turn rather than
    /// adding to it.
    pub fn mark_turn(&self) {
        let mut last = self.last_turn.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(Instant::now());
    }
}
