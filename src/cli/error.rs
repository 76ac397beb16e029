//! CLI error types and conversions

use crate::config::ConfigError;
use crate::discord::HarvestError;
use crate::output::OutputError;
use crate::youtube::TranscriptError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    /// Harvest error
    #[error("harvest error: {0}")]
    HarvestError(#[from] HarvestError),

    /// Transcript error
    #[error("transcript error: {0}")]
    TranscriptError(#[from] TranscriptError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
