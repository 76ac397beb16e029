//! Capture command implementations
//!
//! One configuration-file-driven run per invocation: every enabled channel
//! (or video) is captured sequentially, per-item failures are logged and the
//! run continues with the remaining items.

use crate::config::{self, Config, DiscordChannelConfig, GlobalSettings, YouTubeVideoConfig};
use crate::discord::{DateWindow, DiscordClient, HarvestRequest, Harvester, TerminationReason};
use crate::output::{self, markdown, DocumentPathBuilder, RenderOptions};
use crate::shutdown::SharedShutdown;
use crate::youtube::YouTubeClient;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::CliError;

/// Capture Discord messages and YouTube transcripts for personal research
#[derive(Debug, Parser)]
#[command(name = "social-capture", version)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Capture all enabled Discord channels
    Discord(DiscordArgs),
    /// Capture transcripts for all enabled YouTube videos
    Youtube(YoutubeArgs),
    /// Probe the credential and every configured channel
    Check,
}

/// Arguments for the `discord` command
#[derive(Debug, Default, Args)]
pub struct DiscordArgs {
    /// Capture only the channel with this configured name
    #[arg(long)]
    pub channel: Option<String>,
}

/// Arguments for the `youtube` command
#[derive(Debug, Default, Args)]
pub struct YoutubeArgs {
    /// Capture only the video with this configured name
    #[arg(long)]
    pub video: Option<String>,
}

/// Outcome of one capture run, aggregated across items.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureSummary {
    /// Items captured and written successfully
    pub succeeded: usize,
    /// Items that failed
    pub failed: usize,
    /// Whether the run was interrupted
    pub cancelled: bool,
}

impl CaptureSummary {
    /// Process exit code: 0 when at least one item succeeded (or nothing
    /// failed), 1 on total failure, 130 on interrupt.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            130
        } else if self.failed > 0 && self.succeeded == 0 {
            1
        } else {
            0
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}").unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

fn render_options(settings: &GlobalSettings) -> RenderOptions {
    RenderOptions {
        include_metadata: settings.include_metadata,
        include_attachments: settings.include_attachments,
    }
}

impl DiscordArgs {
    /// Capture all enabled channels sequentially.
    pub async fn execute(
        &self,
        cli: &Cli,
        shutdown: SharedShutdown,
    ) -> Result<CaptureSummary, CliError> {
        let config = Config::load(&cli.config)?;
        let token = config::discord_token()?;

        // a malformed global window aborts the run before any request
        let window = DateWindow::parse(
            config.settings.start_date.as_deref(),
            config.settings.end_date.as_deref(),
        )?;

        let client = DiscordClient::new(&token, config.settings.discord_delay())?;
        let harvester = Harvester::new(client).with_shutdown(shutdown.clone());
        let paths = DocumentPathBuilder::new(&config.settings.output_directory);
        let options = render_options(&config.settings);

        let channels: Vec<&DiscordChannelConfig> = config
            .enabled_channels()
            .filter(|c| self.channel.as_ref().map_or(true, |name| *name == c.name))
            .collect();
        if channels.is_empty() {
            warn!("no enabled Discord channels matched; nothing to capture");
        }

        let mut summary = CaptureSummary::default();
        for channel in channels {
            if shutdown.is_shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            let bar = spinner(format!("capturing #{}", channel.name));
            match capture_channel(&harvester, channel, &window, &config, &paths, options).await {
                Ok(reason) => {
                    summary.succeeded += 1;
                    if reason == TerminationReason::Cancelled {
                        summary.cancelled = true;
                    }
                    bar.finish_with_message(format!("captured #{} ({reason})", channel.name));
                }
                Err(e) => {
                    summary.failed += 1;
                    bar.finish_with_message(format!("failed #{}", channel.name));
                    error!("channel {} failed: {e}", channel.name);
                }
            }
        }

        if shutdown.is_shutdown_requested() {
            summary.cancelled = true;
        }
        info!(
            "discord capture finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}

async fn capture_channel(
    harvester: &Harvester,
    channel: &DiscordChannelConfig,
    window: &DateWindow,
    config: &Config,
    paths: &DocumentPathBuilder,
    options: RenderOptions,
) -> Result<TerminationReason, CliError> {
    let target = channel.target_id();

    let info = harvester.client().channel_info(target).await?;

    let mut request = HarvestRequest::new(target).with_window(window.clone());
    if let Some(budget) = channel.budget() {
        request = request.with_budget(budget);
    }

    let outcome = harvester.harvest(&request).await?;
    if outcome.reason.is_complete() {
        info!(
            "channel {}: {} messages ({})",
            channel.name,
            outcome.len(),
            outcome.reason
        );
    } else {
        warn!(
            "channel {}: partial capture, {} messages ({})",
            channel.name,
            outcome.len(),
            outcome.reason
        );
    }

    let captured_at = Utc::now();
    let format = config.settings.output_format;
    if format.wants_markdown() {
        let doc = markdown::render_messages(&outcome.messages, Some(&info), captured_at, options);
        let path = paths.document_path("discord", &channel.name, captured_at, "md");
        output::write_document(&path, &doc)?;
        info!("wrote {}", path.display());
    }
    if format.wants_json() {
        let doc = output::json::render_messages(&outcome, Some(&info), captured_at)?;
        let path = paths.document_path("discord", &channel.name, captured_at, "json");
        output::write_document(&path, &doc)?;
        info!("wrote {}", path.display());
    }

    Ok(outcome.reason)
}

impl YoutubeArgs {
    /// Capture transcripts for all enabled videos sequentially.
    pub async fn execute(
        &self,
        cli: &Cli,
        shutdown: SharedShutdown,
    ) -> Result<CaptureSummary, CliError> {
        let config = Config::load(&cli.config)?;
        let client = YouTubeClient::new(config.settings.youtube_delay())?;
        let paths = DocumentPathBuilder::new(&config.settings.output_directory);
        let options = render_options(&config.settings);

        let videos: Vec<&YouTubeVideoConfig> = config
            .enabled_videos()
            .filter(|v| self.video.as_ref().map_or(true, |name| *name == v.name))
            .collect();
        if videos.is_empty() {
            warn!("no enabled YouTube videos matched; nothing to capture");
        }

        let mut summary = CaptureSummary::default();
        for video in videos {
            if shutdown.is_shutdown_requested() {
                summary.cancelled = true;
                break;
            }

            let bar = spinner(format!("fetching transcript: {}", video.name));
            match capture_video(&client, video, &config, &paths, options).await {
                Ok(segments) => {
                    summary.succeeded += 1;
                    bar.finish_with_message(format!("captured {} ({segments} segments)", video.name));
                }
                Err(e) => {
                    summary.failed += 1;
                    bar.finish_with_message(format!("failed {}", video.name));
                    error!("video {} failed: {e}", video.name);
                }
            }
        }

        info!(
            "youtube capture finished: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        );
        Ok(summary)
    }
}

async fn capture_video(
    client: &YouTubeClient,
    video: &YouTubeVideoConfig,
    config: &Config,
    paths: &DocumentPathBuilder,
    options: RenderOptions,
) -> Result<usize, CliError> {
    let transcript = client.fetch_transcript(&video.url, &video.languages).await?;

    let format = config.settings.output_format;
    if format.wants_markdown() {
        let doc = markdown::render_transcript(&transcript, options);
        let path = paths.document_path("youtube", &video.name, transcript.fetched_at, "md");
        output::write_document(&path, &doc)?;
        info!("wrote {}", path.display());
    }
    if format.wants_json() {
        let doc = output::json::render_transcript(&transcript)?;
        let path = paths.document_path("youtube", &video.name, transcript.fetched_at, "json");
        output::write_document(&path, &doc)?;
        info!("wrote {}", path.display());
    }

    Ok(transcript.segments.len())
}

/// The `check` command: probe the credential, then every configured channel.
pub async fn execute_check(cli: &Cli, shutdown: SharedShutdown) -> Result<CaptureSummary, CliError> {
    let config = Config::load(&cli.config)?;
    let token = config::discord_token()?;
    let client = DiscordClient::new(&token, config.settings.discord_delay())?;

    let user = client.current_user().await?;
    println!(
        "authenticated as {} (id {}, verified: {})",
        user.username, user.id, user.verified
    );

    let mut summary = CaptureSummary::default();
    for channel in config.enabled_channels() {
        if shutdown.is_shutdown_requested() {
            summary.cancelled = true;
            break;
        }
        match client.channel_info(channel.target_id()).await {
            Ok(info) => {
                summary.succeeded += 1;
                println!("ok   {} -> #{} (type {})", channel.name, info.name, info.kind);
            }
            Err(e) => {
                summary.failed += 1;
                println!("FAIL {} -> {e}", channel.name);
            }
        }
    }
    Ok(summary)
}
