//! # Social Capture Library
//!
//! Archives conversational and media content from two external platforms for
//! personal research: Discord channel message history and YouTube video
//! transcripts.
//!
//! ## Features
//!
//! - **Bounded message harvesting**: walks a Discord channel's history
//!   backward in rate-limited, cursor-paginated batches with an optional
//!   total-message budget and calendar-date window
//! - **Throttling survival**: honors server-specified 429 waits and retries
//!   transient transport failures with bounded exponential backoff
//! - **Transcript capture**: resolves YouTube URLs to caption tracks and
//!   fetches timed-text transcripts in a preferred language
//! - **Document output**: renders harvested content as Markdown or JSON
//!   documents under a configurable capture directory
//!
//! ## Quick Start
//!
//! ```no_run
//! use social_capture::discord::{DiscordClient, HarvestRequest, Harvester};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = DiscordClient::new("user-token", Duration::from_millis(2500))?;
//! let harvester = Harvester::new(client);
//!
//! let request = HarvestRequest::new("1234567890123456789").with_budget(500);
//! let result = harvester.harvest(&request).await?;
//!
//! println!("{} messages ({})", result.messages.len(), result.reason);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`snowflake`] - Platform identifier codec (date ↔ snowflake conversion)
//! - [`discord`] - Message harvester: rate governor, page fetcher, harvest loop
//! - [`youtube`] - Transcript fetcher and segment model
//! - [`config`] - YAML configuration and environment credentials
//! - [`output`] - Markdown/JSON renderers and output path handling
//! - [`cli`] - Command implementations behind the `social-capture` binary

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Configuration loading (YAML file + environment)
pub mod config;

/// Discord message harvesting
pub mod discord;

/// Document renderers and output paths
pub mod output;

/// Graceful shutdown coordination
pub mod shutdown;

/// Platform identifier codec
pub mod snowflake;

/// YouTube transcript fetching
pub mod youtube;

pub use snowflake::Snowflake;

/// Author reference attached to a harvested message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Platform-assigned user id (string digits)
    pub id: String,
    /// Display name
    pub username: String,
    /// Legacy four-digit discriminator; `"0"` on migrated accounts
    pub discriminator: String,
    /// Whether the author is a bot account
    pub bot: bool,
}

impl Author {
    /// Render the author the way the platform displays it:
    /// `name#1234` for legacy discriminators, plus a `[BOT]` tag.
    pub fn display_name(&self) -> String {
        let mut name = self.username.clone();
        if !self.discriminator.is_empty() && self.discriminator != "0" {
            name.push('#');
            name.push_str(&self.discriminator);
        }
        if self.bot {
            name.push_str(" [BOT]");
        }
        name
    }
}

/// Attachment descriptor carried by a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename
    pub filename: String,
    /// Download URL
    pub url: String,
    /// Size in bytes
    pub size: u64,
}

/// A single harvested message, normalized from the wire representation.
///
/// `id` and `timestamp` are consistent under the platform's
/// identifier-encodes-time scheme: a later id never corresponds to an
/// earlier timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Platform-assigned identifier, strictly increasing with creation time
    pub id: Snowflake,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Author reference
    pub author: Author,
    /// Textual content; may be empty
    pub content: String,
    /// Ordered attachment descriptors
    pub attachments: Vec<Attachment>,
    /// Count of embedded rich-content items
    pub embed_count: usize,
    /// Last edit timestamp, if the message was edited
    pub edited_timestamp: Option<DateTime<Utc>>,
}

impl Message {
    /// Whether the message carries nothing worth rendering.
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty() && self.attachments.is_empty() && self.embed_count == 0
    }
}

/// Channel metadata handed to the renderer alongside a harvest result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel id (string digits)
    pub id: String,
    /// Channel name
    pub name: String,
    /// Platform channel type code
    pub kind: u8,
    /// Owning guild id, absent for DM channels
    pub guild_id: Option<String>,
    /// Channel topic, if set
    pub topic: Option<String>,
}
