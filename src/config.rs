//! Configuration loading
//!
//! A YAML file (`config.yaml`) describes what to capture and how to render
//! it; the credential comes from the environment, optionally via a `.env`
//! file. The capture loops treat a loaded configuration as already
//! validated.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file missing or unreadable
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Config file is not valid YAML for the expected shape
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Config file parsed but carries invalid values
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Required environment variable is absent
    #[error("{0} not set in environment; copy .env.example to .env and fill it in")]
    MissingEnv(&'static str),
}

/// Rendering target for captured content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown documents only
    #[default]
    Markdown,
    /// JSON documents only
    Json,
    /// Both Markdown and JSON
    Both,
}

impl OutputFormat {
    /// Whether Markdown documents should be written.
    pub fn wants_markdown(self) -> bool {
        matches!(self, Self::Markdown | Self::Both)
    }

    /// Whether JSON documents should be written.
    pub fn wants_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }
}

/// One Discord channel or thread to capture.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordChannelConfig {
    /// Label used in logs and output filenames
    pub name: String,
    /// Owning guild id, informational only
    #[serde(default)]
    pub guild_id: Option<String>,
    /// Channel id (string digits)
    pub channel_id: String,
    /// Thread id; when present it is harvested instead of the channel
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Disabled entries are skipped without error
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total-message budget; 0 means unbounded
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl DiscordChannelConfig {
    /// The id actually harvested: the thread when one is configured.
    pub fn target_id(&self) -> &str {
        self.thread_id.as_deref().unwrap_or(&self.channel_id)
    }

    /// The message budget, with 0 meaning unbounded.
    pub fn budget(&self) -> Option<usize> {
        (self.max_history > 0).then_some(self.max_history)
    }
}

/// One YouTube video to capture.
#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeVideoConfig {
    /// Label used in logs and output filenames
    pub name: String,
    /// Video URL (watch, share, or embed form)
    pub url: String,
    /// Disabled entries are skipped without error
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Preferred transcript languages, in order
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

/// Discord configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfig {
    /// Channels to capture
    #[serde(default)]
    pub channels: Vec<DiscordChannelConfig>,
}

/// YouTube configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YouTubeConfig {
    /// Videos to capture
    #[serde(default)]
    pub videos: Vec<YouTubeVideoConfig>,
}

/// Global capture settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Rendering target
    pub output_format: OutputFormat,
    /// Root directory for rendered documents
    pub output_directory: PathBuf,
    /// Minimum seconds between Discord requests
    pub discord_delay: f64,
    /// Minimum seconds between YouTube requests
    pub youtube_delay: f64,
    /// Include channel/video metadata headers in rendered documents
    pub include_metadata: bool,
    /// Include attachment link lists in rendered documents
    pub include_attachments: bool,
    /// Window lower bound (`YYYY-MM-DD`), applied to every channel
    pub start_date: Option<String>,
    /// Window upper bound (`YYYY-MM-DD`), applied to every channel
    pub end_date: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::default(),
            output_directory: PathBuf::from("./capture"),
            discord_delay: 2.5,
            youtube_delay: 1.0,
            include_metadata: true,
            include_attachments: false,
            start_date: None,
            end_date: None,
        }
    }
}

impl GlobalSettings {
    /// Discord request spacing as a [`Duration`].
    pub fn discord_delay(&self) -> Duration {
        Duration::from_secs_f64(self.discord_delay.max(0.0))
    }

    /// YouTube request spacing as a [`Duration`].
    pub fn youtube_delay(&self) -> Duration {
        Duration::from_secs_f64(self.youtube_delay.max(0.0))
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Discord section
    pub discord: DiscordConfig,
    /// YouTube section
    pub youtube: YouTubeConfig,
    /// Global settings
    pub settings: GlobalSettings,
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate ids and URLs without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for channel in &self.discord.channels {
            if !is_digits(&channel.channel_id) {
                return Err(ConfigError::Invalid(format!(
                    "channel {} has a non-numeric channel_id: {}",
                    channel.name, channel.channel_id
                )));
            }
            for (label, id) in [("guild_id", &channel.guild_id), ("thread_id", &channel.thread_id)] {
                if let Some(id) = id {
                    if !is_digits(id) {
                        return Err(ConfigError::Invalid(format!(
                            "channel {} has a non-numeric {label}: {id}",
                            channel.name
                        )));
                    }
                }
            }
        }
        for video in &self.youtube.videos {
            if crate::youtube::extract_video_id(&video.url).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "video {} has an unrecognizable URL: {}",
                    video.name, video.url
                )));
            }
        }
        Ok(())
    }

    /// Enabled Discord channels.
    pub fn enabled_channels(&self) -> impl Iterator<Item = &DiscordChannelConfig> {
        self.discord.channels.iter().filter(|c| c.enabled)
    }

    /// Enabled YouTube videos.
    pub fn enabled_videos(&self) -> impl Iterator<Item = &YouTubeVideoConfig> {
        self.youtube.videos.iter().filter(|v| v.enabled)
    }
}

/// Read the Discord user token from the environment, loading `.env` first
/// when present.
pub fn discord_token() -> Result<String, ConfigError> {
    let _ = dotenvy::dotenv();
    std::env::var("DISCORD_USER_TOKEN")
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(ConfigError::MissingEnv("DISCORD_USER_TOKEN"))
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn default_true() -> bool {
    true
}

fn default_max_history() -> usize {
    200
}

fn default_languages() -> Vec<String> {
    vec!["en".to_string(), "en-US".to_string()]
}
