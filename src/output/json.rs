//! JSON rendering

use crate::discord::HarvestOutcome;
use crate::output::{OutputError, OutputResult};
use crate::youtube::Transcript;
use crate::{ChannelInfo, Message};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Serializable archive of one channel harvest.
#[derive(Debug, Serialize)]
struct MessageArchive<'a> {
    channel: Option<&'a ChannelInfo>,
    captured_at: DateTime<Utc>,
    termination_reason: String,
    message_count: usize,
    messages: &'a [Message],
}

/// Render a harvest outcome as pretty-printed JSON.
pub fn render_messages(
    outcome: &HarvestOutcome,
    channel: Option<&ChannelInfo>,
    captured_at: DateTime<Utc>,
) -> OutputResult<String> {
    let archive = MessageArchive {
        channel,
        captured_at,
        termination_reason: outcome.reason.to_string(),
        message_count: outcome.messages.len(),
        messages: &outcome.messages,
    };
    serde_json::to_string_pretty(&archive)
        .map_err(|e| OutputError::SerializationError(e.to_string()))
}

/// Render a transcript as pretty-printed JSON.
pub fn render_transcript(transcript: &Transcript) -> OutputResult<String> {
    serde_json::to_string_pretty(transcript)
        .map_err(|e| OutputError::SerializationError(e.to_string()))
}
