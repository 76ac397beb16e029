//! YouTube transcript client
//!
//! The platform has no public transcript endpoint; caption tracks are
//! discovered from the player payload embedded in the watch page, and the
//! selected track's timed-text XML is fetched and parsed into segments.

use crate::discord::rate_limit::{RateGovernor, DEFAULT_YOUTUBE_DELAY};
use crate::youtube::{Transcript, TranscriptError, TranscriptSegment};
use chrono::Utc;
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Public web front end; overridden in tests.
pub const WATCH_BASE_URL: &str = "https://www.youtube.com";

const CAPTION_TRACKS_MARKER: &str = "\"captionTracks\":";

#[derive(Debug, Clone, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// `"asr"` marks an auto-generated track
    #[serde(default)]
    kind: Option<String>,
}

impl CaptionTrack {
    fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }
}

/// Extract the eleven-character video id from a watch, share, embed, or
/// shorts URL.
pub fn extract_video_id(url: &str) -> Result<String, TranscriptError> {
    let invalid = || TranscriptError::InvalidUrl {
        url: url.to_string(),
    };

    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    let host = parsed
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .trim_start_matches("m.");

    let candidate = match host {
        "youtu.be" => parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            if parsed.path() == "/watch" {
                parsed
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, value)| value.into_owned())
            } else {
                let mut segments = parsed.path_segments().into_iter().flatten();
                match (segments.next(), segments.next()) {
                    (Some("embed" | "shorts" | "v"), Some(id)) => Some(id.to_string()),
                    _ => None,
                }
            }
        }
        _ => None,
    };

    candidate.filter(|id| is_video_id(id)).ok_or_else(invalid)
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Client for fetching video transcripts.
pub struct YouTubeClient {
    http: reqwest::Client,
    base_url: String,
    governor: RateGovernor,
}

impl YouTubeClient {
    /// Create a client with the given request spacing.
    pub fn new(rate_limit_delay: Duration) -> Result<Self, TranscriptError> {
        Self::with_base_url(rate_limit_delay, WATCH_BASE_URL)
    }

    /// Create a client against a custom base URL (for testing).
    pub fn with_base_url(
        rate_limit_delay: Duration,
        base_url: impl Into<String>,
    ) -> Result<Self, TranscriptError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| TranscriptError::TransportError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            governor: RateGovernor::new(rate_limit_delay),
        })
    }

    /// Create a client with the default spacing.
    pub fn with_default_delay() -> Result<Self, TranscriptError> {
        Self::new(DEFAULT_YOUTUBE_DELAY)
    }

    /// Fetch the transcript for a video URL in the first available preferred
    /// language.
    pub async fn fetch_transcript(
        &self,
        video_url: &str,
        languages: &[String],
    ) -> Result<Transcript, TranscriptError> {
        let video_id = extract_video_id(video_url)?;

        let watch_url = format!("{}/watch?v={}", self.base_url, video_id);
        let html = self.get_text(&watch_url).await?;

        let tracks = match caption_tracks(&html) {
            Some(tracks) => tracks?,
            None => {
                return Err(if looks_unplayable(&html) {
                    TranscriptError::VideoUnavailable { video_id }
                } else {
                    TranscriptError::TranscriptsDisabled { video_id }
                })
            }
        };

        let track =
            select_track(&tracks, languages).ok_or_else(|| TranscriptError::NoTranscriptFound {
                video_id: video_id.clone(),
                languages: languages.join(", "),
            })?;
        debug!(
            "video {}: selected {} track ({})",
            video_id,
            track.language_code,
            if track.is_generated() { "generated" } else { "manual" }
        );

        let xml = self.get_text(&track.base_url).await?;
        let segments = parse_timed_text(&xml)?;
        if segments.is_empty() {
            warn!("video {video_id}: transcript track was empty");
        }

        Ok(Transcript {
            video_id,
            video_url: video_url.to_string(),
            language: track.language_code.clone(),
            segments,
            fetched_at: Utc::now(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String, TranscriptError> {
        self.governor.await_turn().await;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| TranscriptError::TransportError(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptError::TransportError(format!(
                "unexpected status {status} from {url}"
            )));
        }
        response
            .text()
            .await
            .map_err(|e| TranscriptError::TransportError(e.to_string()))
    }
}

/// Locate and parse the `captionTracks` array in the watch-page payload.
/// `None` means the page carries no caption data at all.
fn caption_tracks(html: &str) -> Option<Result<Vec<CaptionTrack>, TranscriptError>> {
    let start = html.find(CAPTION_TRACKS_MARKER)? + CAPTION_TRACKS_MARKER.len();
    let Some(slice) = json_array_slice(&html[start..]) else {
        return Some(Err(TranscriptError::TransportError(
            "unterminated captionTracks array in watch page".to_string(),
        )));
    };
    Some(
        serde_json::from_str::<Vec<CaptionTrack>>(slice).map_err(|e| {
            TranscriptError::TransportError(format!("malformed captionTracks array: {e}"))
        }),
    )
}

/// Slice out a balanced JSON array starting at the first `[`, respecting
/// string literals and escapes.
fn json_array_slice(s: &str) -> Option<&str> {
    let open = s.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[open..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[open..open + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn looks_unplayable(html: &str) -> bool {
    html.contains("\"playabilityStatus\"")
        && (html.contains("\"status\":\"ERROR\"") || html.contains("\"status\":\"LOGIN_REQUIRED\""))
}

/// Pick the first track matching the preferred languages in order: exact
/// code first, then prefix ("en" accepts "en-US"), preferring manual tracks
/// over generated ones at each step.
fn select_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    for language in languages {
        if let Some(track) = best_match(tracks, |t| t.language_code == *language) {
            return Some(track);
        }
        if let Some(track) = best_match(tracks, |t| {
            t.language_code.split('-').next() == Some(language.as_str())
        }) {
            return Some(track);
        }
    }
    None
}

fn best_match<'a>(
    tracks: &'a [CaptionTrack],
    matches: impl Fn(&CaptionTrack) -> bool,
) -> Option<&'a CaptionTrack> {
    tracks
        .iter()
        .filter(|t| matches(t))
        .min_by_key(|t| t.is_generated())
}

/// Parse a timed-text document (`<transcript><text start dur>...`) into
/// segments. Empty segments are dropped.
fn parse_timed_text(xml: &str) -> Result<Vec<TranscriptSegment>, TranscriptError> {
    let mut reader = Reader::from_str(xml);
    let mut segments = Vec::new();
    let mut current: Option<TranscriptSegment> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => {
                let mut segment = TranscriptSegment {
                    text: String::new(),
                    start: 0.0,
                    duration: 0.0,
                };
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value);
                    match attr.key.as_ref() {
                        b"start" => segment.start = value.parse().unwrap_or(0.0),
                        b"dur" => segment.duration = value.parse().unwrap_or(0.0),
                        _ => {}
                    }
                }
                current = Some(segment);
            }
            Ok(Event::Text(t)) => {
                if let Some(segment) = current.as_mut() {
                    let text = t.unescape().map(|c| c.into_owned()).unwrap_or_default();
                    segment.text.push_str(&text);
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => {
                if let Some(mut segment) = current.take() {
                    segment.text = segment.text.trim().to_string();
                    if !segment.text.is_empty() {
                        segments.push(segment);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TranscriptError::TransportError(format!(
                    "malformed transcript XML: {e}"
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(segments)
}
