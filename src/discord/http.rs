//! Discord HTTP transport
//!
//! One bounded request per page of messages, with failure classification:
//! 429 responses are retried after the server-specified wait, network and
//! 5xx failures are retried with exponential backoff, and any other 4xx is
//! fatal. Every attempt consumes one rate-governor turn, except a 429 wait,
//! which replaces the turn's spacing outright.

use crate::discord::rate_limit::{RateGovernor, DISCORD_MIN_DELAY};
use crate::discord::retry::{calculate_backoff, MAX_RETRIES};
use crate::discord::{HarvestError, HarvestResult};
use crate::snowflake::Snowflake;
use crate::{Attachment, Author, ChannelInfo, Message};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Discord REST API base URL.
pub const API_BASE_URL: &str = "https://discord.com/api/v9";

/// The platform never returns more than this many messages per page.
pub const DISCORD_MAX_PAGE_SIZE: usize = 100;

/// Browser-style user agent; user-token requests with a bare client UA are
/// rejected.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Authenticated user identity, returned by the credential probe.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentUser {
    /// User id (string digits)
    pub id: String,
    /// Account name
    pub username: String,
    /// Legacy discriminator
    #[serde(default)]
    pub discriminator: String,
    /// Whether the account's email is verified
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
struct WireAuthor {
    #[serde(default)]
    id: String,
    #[serde(default)]
    username: String,
    #[serde(default)]
    discriminator: String,
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    timestamp: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    author: Option<WireAuthor>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
    #[serde(default)]
    embeds: Vec<Value>,
    #[serde(default)]
    edited_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireChannel {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type", default)]
    kind: u8,
    #[serde(default)]
    guild_id: Option<String>,
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetryAfterBody {
    retry_after: f64,
}

/// HTTP client for the Discord REST API.
///
/// Owns the rate governor for its session; harvests of different channels
/// reuse the same client and therefore share its spacing.
pub struct DiscordClient {
    http: reqwest::Client,
    base_url: String,
    governor: RateGovernor,
    max_retries: u32,
}

impl DiscordClient {
    /// Create a client for a user token.
    ///
    /// `rate_limit_delay` below the platform floor is clamped up to
    /// [`DISCORD_MIN_DELAY`].
    pub fn new(token: &str, rate_limit_delay: Duration) -> HarvestResult<Self> {
        Self::with_base_url(token, rate_limit_delay, API_BASE_URL)
    }

    /// Create a client against a custom base URL (for testing).
    pub fn with_base_url(
        token: &str,
        rate_limit_delay: Duration,
        base_url: impl Into<String>,
    ) -> HarvestResult<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(token.trim())
            .map_err(|_| HarvestError::TransportError("credential is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| HarvestError::TransportError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            governor: RateGovernor::new(rate_limit_delay.max(DISCORD_MIN_DELAY)),
            max_retries: MAX_RETRIES,
        })
    }

    /// Replace the rate governor (tests use a zero-delay governor).
    pub fn with_governor(mut self, governor: RateGovernor) -> Self {
        self.governor = governor;
        self
    }

    /// Override the bounded retry count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The governor spacing currently in force.
    pub fn rate_limit_delay(&self) -> Duration {
        self.governor.min_delay()
    }

    /// Fetch one page of messages anchored at a cursor.
    ///
    /// `limit` is clamped to the platform maximum. Exactly one of
    /// `before`/`after` is meaningful per call; the harvester supplies
    /// `after` only on the first page of a lower-bounded walk. Records
    /// missing required fields are dropped with a logged warning.
    pub async fn fetch_page(
        &self,
        channel_id: &str,
        limit: usize,
        before: Option<Snowflake>,
        after: Option<Snowflake>,
    ) -> HarvestResult<Vec<Message>> {
        let limit = limit.min(DISCORD_MAX_PAGE_SIZE);
        let mut params: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if let Some(before) = before {
            params.push(("before", before.to_string()));
        }
        if let Some(after) = after {
            params.push(("after", after.to_string()));
        }

        let url = format!("{}/channels/{}/messages", self.base_url, channel_id);
        let body = self.get_json(&url, &params, channel_id).await?;

        let records = match body {
            Value::Array(records) => records,
            other => {
                return Err(HarvestError::TransportError(format!(
                    "expected a message array, got: {other}"
                )))
            }
        };

        let mut messages = Vec::with_capacity(records.len());
        for record in records {
            match normalize_message(record) {
                Ok(message) => messages.push(message),
                Err(reason) => {
                    warn!("dropping malformed message record from {channel_id}: {reason}");
                }
            }
        }

        debug!(
            "retrieved {} messages from channel {}",
            messages.len(),
            channel_id
        );
        Ok(messages)
    }

    /// Fetch channel metadata.
    pub async fn channel_info(&self, channel_id: &str) -> HarvestResult<ChannelInfo> {
        let url = format!("{}/channels/{}", self.base_url, channel_id);
        let body = self.get_json(&url, &[], channel_id).await?;
        let channel: WireChannel = serde_json::from_value(body)
            .map_err(|e| HarvestError::TransportError(format!("malformed channel object: {e}")))?;
        Ok(ChannelInfo {
            id: channel.id,
            name: channel.name.unwrap_or_default(),
            kind: channel.kind,
            guild_id: channel.guild_id,
            topic: channel.topic,
        })
    }

    /// Probe the credential by fetching the authenticated user.
    pub async fn current_user(&self) -> HarvestResult<CurrentUser> {
        let url = format!("{}/users/@me", self.base_url);
        let body = self.get_json(&url, &[], "@me").await?;
        serde_json::from_value(body)
            .map_err(|e| HarvestError::TransportError(format!("malformed user object: {e}")))
    }

    /// GET with bounded retries and failure classification.
    ///
    /// Retries network errors, 5xx, and 429 (after the server-specified
    /// wait). Any other 4xx is fatal. `resource` names the target in errors.
    async fn get_json(
        &self,
        url: &str,
        params: &[(&str, String)],
        resource: &str,
    ) -> HarvestResult<Value> {
        let mut skip_spacing = false;
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if skip_spacing {
                // the 429 wait already served as this turn's spacing
                self.governor.mark_turn();
                skip_spacing = false;
            } else {
                self.governor.await_turn().await;
            }

            let response = match self.http.get(url).query(params).send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(
                        "network error on attempt {}/{}: {}",
                        attempt + 1,
                        self.max_retries + 1,
                        e
                    );
                    last_error = Some(HarvestError::TransportError(e.to_string()));
                    if attempt < self.max_retries {
                        sleep(calculate_backoff(attempt)).await;
                        continue;
                    }
                    break;
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait_secs = response
                    .json::<RetryAfterBody>()
                    .await
                    .map(|body| body.retry_after)
                    .unwrap_or_else(|_| self.governor.min_delay().as_secs_f64());
                let wait_secs = if wait_secs.is_finite() { wait_secs.max(0.0) } else { 0.0 };
                warn!(
                    "rate limited on {} (attempt {}/{}): waiting {:.2}s",
                    resource,
                    attempt + 1,
                    self.max_retries + 1,
                    wait_secs
                );
                last_error = Some(HarvestError::Throttled {
                    attempts: attempt + 1,
                });
                if attempt < self.max_retries {
                    sleep(Duration::from_secs_f64(wait_secs)).await;
                    skip_spacing = true;
                    continue;
                }
                break;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(HarvestError::AccessDenied {
                    channel_id: resource.to_string(),
                });
            }

            if status == StatusCode::NOT_FOUND {
                return Err(HarvestError::NotFound {
                    channel_id: resource.to_string(),
                });
            }

            if status.is_client_error() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown error".to_string());
                return Err(HarvestError::TransportError(format!(
                    "client error {status}: {body}"
                )));
            }

            if status.is_server_error() {
                warn!(
                    "server error {} on attempt {}/{}",
                    status,
                    attempt + 1,
                    self.max_retries + 1
                );
                last_error = Some(HarvestError::TransportError(format!(
                    "server error: {status}"
                )));
                if attempt < self.max_retries {
                    sleep(calculate_backoff(attempt)).await;
                    continue;
                }
                break;
            }

            return response
                .json::<Value>()
                .await
                .map_err(|e| HarvestError::TransportError(format!("failed to deserialize response: {e}")));
        }

        Err(last_error
            .unwrap_or_else(|| HarvestError::TransportError("all retries exhausted".to_string())))
    }
}

/// Normalize a raw transport record into a [`Message`].
///
/// Absent optional fields map to defaults; absent or unparseable id and
/// timestamp reject the record.
fn normalize_message(record: Value) -> Result<Message, String> {
    let wire: WireMessage =
        serde_json::from_value(record).map_err(|e| format!("missing required fields: {e}"))?;

    let id: Snowflake = wire
        .id
        .parse()
        .map_err(|_| format!("unparseable id: {}", wire.id))?;
    let timestamp = parse_wire_timestamp(&wire.timestamp)
        .ok_or_else(|| format!("unparseable timestamp: {}", wire.timestamp))?;

    let author = wire.author.map_or_else(Author::default_unknown, |a| Author {
        id: a.id,
        username: a.username,
        discriminator: a.discriminator,
        bot: a.bot,
    });

    Ok(Message {
        id,
        timestamp,
        author,
        content: wire.content,
        attachments: wire
            .attachments
            .into_iter()
            .map(|a| Attachment {
                filename: a.filename,
                url: a.url,
                size: a.size,
            })
            .collect(),
        embed_count: wire.embeds.len(),
        edited_timestamp: wire
            .edited_timestamp
            .as_deref()
            .and_then(parse_wire_timestamp),
    })
}

fn parse_wire_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl Author {
    fn default_unknown() -> Self {
        Author {
            id: String::new(),
            username: String::new(),
            discriminator: String::new(),
            bot: false,
        }
    }
}
