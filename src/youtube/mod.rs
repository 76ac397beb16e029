//! YouTube transcript fetching
//!
//! Resolves a video URL to its caption tracks and fetches the timed-text
//! transcript for a preferred language. "No transcript" conditions are
//! ordinary typed failures, not transport errors: the caller reports them
//! per-video and moves on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod client;

pub use client::{extract_video_id, YouTubeClient};

/// Transcript fetch errors
#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    /// URL is not a recognizable YouTube video URL
    #[error("invalid video URL: {url}")]
    InvalidUrl {
        /// The rejected URL
        url: String,
    },

    /// The video exists but exposes no caption data at all
    #[error("transcripts are disabled for video {video_id}")]
    TranscriptsDisabled {
        /// The video in question
        video_id: String,
    },

    /// Caption tracks exist, but none in a requested language
    #[error("no transcript in [{languages}] for video {video_id}")]
    NoTranscriptFound {
        /// The video in question
        video_id: String,
        /// The languages that were requested
        languages: String,
    },

    /// The video is private, deleted, or region-blocked
    #[error("video {video_id} is unavailable")]
    VideoUnavailable {
        /// The video in question
        video_id: String,
    },

    /// Network failure or unexpected response shape
    #[error("transport error: {0}")]
    TransportError(String),
}

/// One timed caption segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Caption text
    pub text: String,
    /// Offset from the start of the video, in seconds
    pub start: f64,
    /// Display duration in seconds
    pub duration: f64,
}

/// A fetched transcript with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Eleven-character video id
    pub video_id: String,
    /// The URL the transcript was requested for
    pub video_url: String,
    /// Language code of the fetched track
    pub language: String,
    /// Ordered caption segments
    pub segments: Vec<TranscriptSegment>,
    /// When the transcript was fetched
    pub fetched_at: DateTime<Utc>,
}
