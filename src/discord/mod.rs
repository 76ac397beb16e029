//! Discord message harvesting
//!
//! The harvester walks a channel's message history backward in bounded,
//! rate-limited batches and assembles a deduplicated, oldest-first result.

use crate::snowflake::{self, Snowflake, SnowflakeError};
use crate::Message;
use chrono::NaiveDate;
use std::fmt;

pub mod harvest;
pub mod http;
pub mod rate_limit;
pub mod retry;

pub use harvest::Harvester;
pub use http::{DiscordClient, CurrentUser, DISCORD_MAX_PAGE_SIZE};
pub use rate_limit::RateGovernor;

/// Harvest errors (fatal unless noted)
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Malformed window bound; aborts before any request
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Credential lacks permission for the channel (401/403)
    #[error("access denied to channel {channel_id}")]
    AccessDenied {
        /// The inaccessible channel
        channel_id: String,
    },

    /// Channel does not exist or is not visible (404)
    #[error("channel {channel_id} not found")]
    NotFound {
        /// The missing channel
        channel_id: String,
    },

    /// Throttling persisted through every bounded retry
    #[error("throttled: gave up after {attempts} attempts")]
    Throttled {
        /// Attempts made before giving up
        attempts: u32,
    },

    /// Network or server failure that survived the retry policy
    #[error("transport error: {0}")]
    TransportError(String),
}

impl From<SnowflakeError> for HarvestError {
    fn from(err: SnowflakeError) -> Self {
        HarvestError::InvalidDate(err.to_string())
    }
}

/// Result type for harvest operations
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Optional inclusive calendar-date bounds restricting which messages are
/// eligible for inclusion.
///
/// If both bounds are present the caller is expected to keep `after <=
/// before`; a violated invariant yields zero eligible results, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateWindow {
    /// Inclusive lower bound: keep messages created on or after this date
    pub after: Option<NaiveDate>,
    /// Inclusive upper bound: keep messages created on or before this date
    pub before: Option<NaiveDate>,
}

impl DateWindow {
    /// Parse optional `YYYY-MM-DD` strings into a window.
    pub fn parse(
        after: Option<&str>,
        before: Option<&str>,
    ) -> Result<Self, HarvestError> {
        let after = after.map(snowflake::parse_date).transpose()?;
        let before = before.map(snowflake::parse_date).transpose()?;
        Ok(Self { after, before })
    }

    /// Whether neither bound is set.
    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }

    /// Translate the window into identifier-space bounds, once, at harvest
    /// start.
    pub fn id_bounds(&self) -> (Option<Snowflake>, Option<Snowflake>) {
        (
            self.after.map(snowflake::date_lower_bound),
            self.before.map(snowflake::date_upper_bound),
        )
    }
}

/// One complete harvest order for a single channel.
#[derive(Debug, Clone)]
pub struct HarvestRequest {
    /// Target channel id (string digits)
    pub channel_id: String,
    /// Total-message budget; `None` is unbounded
    pub max_messages: Option<usize>,
    /// Messages requested per page, clamped to the platform maximum
    pub batch_size: usize,
    /// Optional calendar-date window
    pub window: DateWindow,
}

impl HarvestRequest {
    /// Default per-page batch size.
    pub const DEFAULT_BATCH_SIZE: usize = 50;

    /// Create an unbounded request for a channel.
    pub fn new(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            max_messages: None,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            window: DateWindow::default(),
        }
    }

    /// Cap the total number of messages harvested.
    pub fn with_budget(mut self, max_messages: usize) -> Self {
        self.max_messages = Some(max_messages);
        self
    }

    /// Override the per-page batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Restrict the harvest to a calendar-date window.
    pub fn with_window(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }
}

/// Why a harvest stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The channel ran out of older messages
    EndOfHistory,
    /// The total-message budget was exhausted
    BudgetReached,
    /// The backward walk crossed the window's lower bound
    LowerBoundReached,
    /// A fatal fetch failure after at least one successful page; the result
    /// holds the pages harvested so far
    Aborted,
    /// Shutdown was requested between pages
    Cancelled,
}

impl TerminationReason {
    /// Whether the harvest delivered everything it was asked for.
    pub fn is_complete(self) -> bool {
        !matches!(self, Self::Aborted | Self::Cancelled)
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EndOfHistory => "end_of_history",
            Self::BudgetReached => "budget_reached",
            Self::LowerBoundReached => "lower_bound_reached",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// The assembled outcome of one harvest: messages oldest-first plus the
/// reason the walk stopped.
#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    /// Harvested messages, deduplicated and ascending by identifier
    pub messages: Vec<Message>,
    /// Why the harvest stopped
    pub reason: TerminationReason,
}

impl HarvestOutcome {
    /// Number of harvested messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the harvest returned no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
