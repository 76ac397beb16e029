//! Platform identifier codec
//!
//! Discord assigns every message a snowflake: a 64-bit value whose upper bits
//! encode milliseconds since the platform epoch (2015-01-01T00:00:00Z),
//! shifted left to leave room for intra-millisecond sequence bits. Snowflakes
//! are therefore a sortable time proxy, which lets the harvester filter by
//! calendar date without a dedicated search endpoint.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Milliseconds between the Unix epoch and the platform epoch
/// (2015-01-01T00:00:00Z).
pub const DISCORD_EPOCH_MS: i64 = 1_420_070_400_000;

/// Bits reserved below the timestamp for worker/process/sequence counters.
pub const TIMESTAMP_SHIFT: u32 = 22;

/// Codec errors
#[derive(Debug, thiserror::Error)]
pub enum SnowflakeError {
    /// Malformed calendar date
    #[error("invalid date {input}: expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input
        input: String,
    },

    /// Malformed identifier string
    #[error("invalid identifier {input}: expected string of digits")]
    InvalidId {
        /// The rejected input
        input: String,
    },
}

/// A platform message identifier.
///
/// Ordered by creation time; serialized as string digits, matching the wire
/// representation.
///
/// # Examples
///
/// ```
/// use social_capture::snowflake::Snowflake;
///
/// let id: Snowflake = "175928847299117063".parse().unwrap();
/// assert_eq!(id.to_string(), "175928847299117063");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snowflake(u64);

impl Snowflake {
    /// Wrap a raw identifier value.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw identifier value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Build the smallest identifier whose encoded time is `unix_ms`.
    ///
    /// Instants before the platform epoch clamp to identifier zero; nothing
    /// on the platform predates the epoch.
    pub fn from_unix_ms(unix_ms: i64) -> Self {
        let since_epoch = (unix_ms - DISCORD_EPOCH_MS).max(0) as u64;
        Self(since_epoch << TIMESTAMP_SHIFT)
    }

    /// Milliseconds since the Unix epoch encoded in this identifier.
    pub fn timestamp_ms(self) -> i64 {
        (self.0 >> TIMESTAMP_SHIFT) as i64 + DISCORD_EPOCH_MS
    }

    /// The creation instant encoded in this identifier.
    pub fn timestamp(self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms()).unwrap_or_default()
    }
}

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = SnowflakeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Snowflake)
            .map_err(|_| SnowflakeError::InvalidId {
                input: s.to_string(),
            })
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Result<NaiveDate, SnowflakeError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| SnowflakeError::InvalidDate {
        input: input.to_string(),
    })
}

/// Identifier-space lower bound for a date: midnight UTC.
///
/// Every message created on or after `date` has an identifier `>=` the
/// returned value.
pub fn date_lower_bound(date: NaiveDate) -> Snowflake {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    Snowflake::from_unix_ms(midnight.and_utc().timestamp_millis())
}

/// Identifier-space upper bound for a date: the last second of the day UTC.
///
/// Accurate to day granularity, which is sufficient for window filtering
/// since identifiers are strictly increasing with time.
pub fn date_upper_bound(date: NaiveDate) -> Snowflake {
    let end_of_day = date
        .and_hms_opt(23, 59, 59)
        .expect("end of day is always valid");
    Snowflake::from_unix_ms(end_of_day.and_utc().timestamp_millis())
}
